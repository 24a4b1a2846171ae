use pbfstream::{Consumer, Node, ParseConfig, PbfDecoder, Relation, Way};

use std::sync::Arc;

fn print_wikidata_tag(tags: &[(&str, &str)]) {
    for (key, value) in tags {
        if *key == "wikidata" {
            println!("{key}: {value}");
        }
    }
}

struct WikidataPrinter;

impl Consumer for WikidataPrinter {
    fn on_node(&self, node: Node<'_>) {
        print_wikidata_tag(&node.tags);
    }

    fn on_way(&self, way: Way<'_>) {
        print_wikidata_tag(&way.tags);
    }

    fn on_relation(&self, relation: Relation<'_>) {
        print_wikidata_tag(&relation.tags);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pbf_path = std::env::args()
        .nth(1)
        .expect("Expected an OSM PBF file as first argument");

    let decoder = PbfDecoder::open(pbf_path)?;
    decoder.parse(Arc::new(WikidataPrinter), &ParseConfig::default())?;

    Ok(())
}
