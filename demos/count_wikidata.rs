use log::info;

use pbfstream::{Consumer, Node, ParseConfig, PbfDecoder, Relation, Way};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static WIKIDATA_COUNT: AtomicUsize = AtomicUsize::new(0);

fn count_tag(tags: &[(&str, &str)]) {
    if tags.iter().any(|(key, _)| *key == "wikidata") {
        WIKIDATA_COUNT.fetch_add(1, Ordering::SeqCst);
    }
}

struct WikidataCounter;

impl Consumer for WikidataCounter {
    fn on_node(&self, node: Node<'_>) {
        count_tag(&node.tags);
    }

    fn on_way(&self, way: Way<'_>) {
        count_tag(&way.tags);
    }

    fn on_relation(&self, relation: Relation<'_>) {
        count_tag(&relation.tags);
    }
}

fn main() {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(log::LevelFilter::Info);
    builder.init();

    let mut args = std::env::args();

    let pbf_path = args.nth(1).expect("Expected an OSM PBF file as first argument");

    let worker_count: usize = match args.next() {
        Some(s) => s.parse().expect("Expected a thread count as second argument"),
        None => 1,
    };

    let start = std::time::Instant::now();

    let decoder = PbfDecoder::open(pbf_path).expect("failed to open input");
    let config = ParseConfig::default().with_worker_count(worker_count);

    if let Err(error) = decoder.parse(Arc::new(WikidataCounter), &config) {
        log::error!("parse failed: {error}");
    }

    info!("Wikidata tag count: {}", WIKIDATA_COUNT.load(Ordering::SeqCst));
    info!(
        "Finished in {:.2}s on {} thread(s)",
        start.elapsed().as_secs_f64(),
        worker_count
    );
}
