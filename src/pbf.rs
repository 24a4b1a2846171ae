//! Generated protobuf message types for the OSM PBF wire format.
//!
//! `fileformat` carries the outer blob container (`Blob`, `BlobHeader`); `osmformat` carries
//! the header and primitive block payloads once a blob has been decompressed. Both are
//! re-exported flatly here since callers never need to know which `.proto` a type came from.

#![allow(clippy::all)]

mod fileformat {
    include!(concat!(env!("OUT_DIR"), "/proto/fileformat.rs"));
}

mod osmformat {
    include!(concat!(env!("OUT_DIR"), "/proto/osmformat.rs"));
}

pub use fileformat::*;
pub use osmformat::*;
