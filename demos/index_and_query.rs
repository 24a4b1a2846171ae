use pbfstream::{Consumer, ElementType, ParseConfig, PbfDecoder};

use std::sync::Arc;

struct NullConsumer;

impl Consumer for NullConsumer {}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args();
    let pbf_path = args.nth(1).expect("Expected an OSM PBF file as first argument");
    let way_id: i64 = args
        .next()
        .expect("Expected a way id as second argument")
        .parse()
        .expect("way id must be an integer");

    let decoder = PbfDecoder::open(&pbf_path)?;

    // First run builds (or reuses an autoloaded) index; on success it's autosaved next to the input.
    decoder.parse(Arc::new(NullConsumer), &ParseConfig::default().with_indexing(true))?;

    match decoder.index().blob_offsets(ElementType::Way, way_id) {
        Ok(offsets) => {
            println!("way {way_id} may live in blob(s) starting at: {offsets:?}");
            for offset in offsets {
                decoder.parse_blob(&PrintingConsumer { target: way_id }, offset)?;
            }
        }
        Err(_) => println!("way {way_id} is not covered by any indexed blob"),
    }

    Ok(())
}

struct PrintingConsumer {
    target: i64,
}

impl Consumer for PrintingConsumer {
    fn on_way(&self, way: pbfstream::Way<'_>) {
        if way.id == self.target {
            println!("way {}: {} ref(s), tags {:?}", way.id, way.refs.len(), way.tags);
        }
    }
}
