//! Various utilities, e.g. coordinate normalization.

use crate::pbf;

/// Normalizes `lat` and `lon` to degrees and returns them in a `(latitude, longitude)` pair.
pub fn normalize_coord(lat: i64, lon: i64, block: &pbf::PrimitiveBlock) -> (f64, f64) {
    let granularity = block.granularity() as i64;
    let lat_offset = block.lat_offset();
    let lon_offset = block.lon_offset();

    (
        1e-9 * (lat_offset + granularity * lat) as f64,
        1e-9 * (lon_offset + granularity * lon) as f64,
    )
}

/// Normalizes a timestamp coming from `pbf::Info` or `pbf::DenseInfo` to milliseconds since the epoch.
pub fn normalize_timestamp(timestamp: i64, block: &pbf::PrimitiveBlock) -> i64 {
    timestamp * block.date_granularity() as i64
}
