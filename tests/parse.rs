use pbfstream::pbf;
use pbfstream::{Consumer, ElementType, Error, Node, ParseConfig, PbfDecoder, Relation, Way};

use prost::Message;

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn write_blob(file: &mut File, block_type: &str, payload: &[u8]) {
    let blob = pbf::Blob {
        raw_size: Some(payload.len() as i32),
        data: Some(pbf::blob::Data::Raw(payload.to_vec())),
    };
    let mut blob_bytes = Vec::new();
    blob.encode(&mut blob_bytes).unwrap();

    let blob_header = pbf::BlobHeader {
        r#type: block_type.to_string(),
        indexdata: None,
        datasize: blob_bytes.len() as i32,
    };
    let mut header_bytes = Vec::new();
    blob_header.encode(&mut header_bytes).unwrap();

    file.write_all(&(header_bytes.len() as i32).to_be_bytes()).unwrap();
    file.write_all(&header_bytes).unwrap();
    file.write_all(&blob_bytes).unwrap();
}

fn write_header_blob(file: &mut File) {
    let header = pbf::HeaderBlock {
        required_features: vec!["OsmSchema-V0.6".to_string(), "DenseNodes".to_string()],
        ..Default::default()
    };
    let mut payload = Vec::new();
    header.encode(&mut payload).unwrap();
    write_blob(file, "OSMHeader", &payload);
}

fn dense_node_block() -> pbf::PrimitiveBlock {
    pbf::PrimitiveBlock {
        stringtable: pbf::StringTable { s: vec![vec![]] },
        primitivegroup: vec![pbf::PrimitiveGroup {
            dense: Some(pbf::DenseNodes {
                id: vec![10, 2, 3], // delta-coded: 10, 12, 15
                lat: vec![0, 0, 0],
                lon: vec![0, 0, 0],
                denseinfo: None,
                keys_vals: Vec::new(),
            }),
            ..Default::default()
        }],
        granularity: None,
        date_granularity: None,
        lat_offset: None,
        lon_offset: None,
    }
}

fn way_block() -> pbf::PrimitiveBlock {
    pbf::PrimitiveBlock {
        stringtable: pbf::StringTable { s: vec![vec![]] },
        primitivegroup: vec![pbf::PrimitiveGroup {
            ways: vec![pbf::Way {
                id: 100,
                keys: vec![],
                vals: vec![],
                info: None,
                refs: vec![10, 2, 3],
            }],
            ..Default::default()
        }],
        granularity: None,
        date_granularity: None,
        lat_offset: None,
        lon_offset: None,
    }
}

fn relation_block() -> pbf::PrimitiveBlock {
    pbf::PrimitiveBlock {
        stringtable: pbf::StringTable {
            s: vec![vec![], b"member".to_vec()],
        },
        primitivegroup: vec![pbf::PrimitiveGroup {
            relations: vec![pbf::Relation {
                id: 200,
                keys: vec![],
                vals: vec![],
                info: None,
                roles_sid: vec![1],
                memids: vec![10],
                types: vec![pbf::relation::MemberType::Way as i32],
            }],
            ..Default::default()
        }],
        granularity: None,
        date_granularity: None,
        lat_offset: None,
        lon_offset: None,
    }
}

fn encode_block(block: &pbf::PrimitiveBlock) -> Vec<u8> {
    let mut buf = Vec::new();
    block.encode(&mut buf).unwrap();
    buf
}

#[derive(Default)]
struct Recorder {
    node_ids: Mutex<Vec<i64>>,
    way_ids: Mutex<Vec<i64>>,
    relation_ids: Mutex<Vec<i64>>,
}

impl Consumer for Recorder {
    fn on_node(&self, node: Node<'_>) {
        self.node_ids.lock().unwrap().push(node.id);
    }

    fn on_way(&self, way: Way<'_>) {
        self.way_ids.lock().unwrap().push(way.id);
    }

    fn on_relation(&self, relation: Relation<'_>) {
        self.relation_ids.lock().unwrap().push(relation.id);
    }
}

#[test]
fn empty_file_parses_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.osm.pbf");
    File::create(&path).unwrap();

    let decoder = PbfDecoder::open(&path).unwrap();
    let consumer = Arc::new(Recorder::default());
    decoder.parse(consumer, &ParseConfig::default().with_indexing(true)).unwrap();

    assert!(decoder.index().is_empty());
}

#[test]
fn header_only_file_has_no_elements_and_one_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header_only.osm.pbf");
    let mut file = File::create(&path).unwrap();
    write_header_blob(&mut file);
    drop(file);

    let decoder = PbfDecoder::open(&path).unwrap();
    let consumer = Arc::new(Recorder::default());
    decoder.parse(consumer.clone(), &ParseConfig::default().with_indexing(true)).unwrap();

    assert!(consumer.node_ids.lock().unwrap().is_empty());
    assert_eq!(decoder.index().len(), 1);
}

#[test]
fn single_dense_blob_emits_nodes_in_order_and_indexes_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dense.osm.pbf");
    let mut file = File::create(&path).unwrap();
    write_header_blob(&mut file);
    write_blob(&mut file, "OSMData", &encode_block(&dense_node_block()));
    drop(file);

    let decoder = PbfDecoder::open(&path).unwrap();
    let consumer = Arc::new(Recorder::default());
    decoder.parse(consumer.clone(), &ParseConfig::default().with_indexing(true)).unwrap();

    assert_eq!(*consumer.node_ids.lock().unwrap(), vec![10, 12, 15]);
    assert_eq!(decoder.index().blob_offsets(ElementType::Node, 12).unwrap().len(), 1);
}

#[test]
fn mixed_blob_sequence_triggers_breakpoints_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.osm.pbf");
    let mut file = File::create(&path).unwrap();
    write_header_blob(&mut file);
    write_blob(&mut file, "OSMData", &encode_block(&dense_node_block()));
    write_blob(&mut file, "OSMData", &encode_block(&way_block()));
    write_blob(&mut file, "OSMData", &encode_block(&relation_block()));
    drop(file);

    // First pass just builds the index so breakpoints exist for the second, triggered pass.
    let decoder = PbfDecoder::open(&path).unwrap();
    decoder
        .parse(Arc::new(Recorder::default()), &ParseConfig::default().with_indexing(true))
        .unwrap();

    let decoder = PbfDecoder::open(&path).unwrap();
    let consumer = Arc::new(Recorder::default());

    // Two independently registered triggers: both must fire at both breakpoints (way, then
    // relation), not just the one matching their registration position.
    let fired_a: Arc<Mutex<Vec<(usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let fired_b: Arc<Mutex<Vec<(usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));

    let fired_a_for_trigger = Arc::clone(&fired_a);
    let trigger_a: pbfstream::Trigger = Box::new(move |breakpoint_index, offset| {
        fired_a_for_trigger.lock().unwrap().push((breakpoint_index, offset));
    });
    let fired_b_for_trigger = Arc::clone(&fired_b);
    let trigger_b: pbfstream::Trigger = Box::new(move |breakpoint_index, offset| {
        fired_b_for_trigger.lock().unwrap().push((breakpoint_index, offset));
    });

    decoder
        .parse_with_triggers(
            Arc::clone(&consumer),
            &ParseConfig::default().with_indexing(true),
            vec![trigger_a, trigger_b],
        )
        .unwrap();

    assert_eq!(*consumer.node_ids.lock().unwrap(), vec![10, 12, 15]);
    assert_eq!(*consumer.way_ids.lock().unwrap(), vec![100]);
    assert_eq!(*consumer.relation_ids.lock().unwrap(), vec![200]);

    let fired_a = fired_a.lock().unwrap();
    let fired_b = fired_b.lock().unwrap();
    assert_eq!(fired_a.len(), 2);
    assert_eq!(fired_b.len(), 2);
    assert_eq!(fired_a[0].0, 0);
    assert_eq!(fired_a[1].0, 1);
    assert_eq!(fired_b[0].0, 0);
    assert_eq!(fired_b[1].0, 1);
    assert!(fired_a[0].1 < fired_a[1].1);
}

#[test]
fn corrupted_zlib_payload_surfaces_as_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.osm.pbf");
    let mut file = File::create(&path).unwrap();
    write_header_blob(&mut file);

    let blob = pbf::Blob {
        raw_size: Some(1024),
        data: Some(pbf::blob::Data::ZlibData(vec![0xff, 0xee, 0xdd, 0xcc])),
    };
    let mut blob_bytes = Vec::new();
    blob.encode(&mut blob_bytes).unwrap();
    let blob_header = pbf::BlobHeader {
        r#type: "OSMData".to_string(),
        indexdata: None,
        datasize: blob_bytes.len() as i32,
    };
    let mut header_bytes = Vec::new();
    blob_header.encode(&mut header_bytes).unwrap();
    file.write_all(&(header_bytes.len() as i32).to_be_bytes()).unwrap();
    file.write_all(&header_bytes).unwrap();
    file.write_all(&blob_bytes).unwrap();
    drop(file);

    let decoder = PbfDecoder::open(&path).unwrap();
    let result = decoder.parse(Arc::new(Recorder::default()), &ParseConfig::default().with_indexing(true));

    assert!(matches!(result, Err(Error::Format(_))));
    assert!(!index_sidecar_path(&path).exists());
}

#[test]
fn index_round_trips_through_autosave_and_autoload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.osm.pbf");
    let mut file = File::create(&path).unwrap();
    write_header_blob(&mut file);
    write_blob(&mut file, "OSMData", &encode_block(&way_block()));
    drop(file);

    {
        let decoder = PbfDecoder::open(&path).unwrap();
        decoder
            .parse(Arc::new(Recorder::default()), &ParseConfig::default().with_indexing(true))
            .unwrap();
    }

    let reopened = PbfDecoder::open(&path).unwrap();
    let offsets_from_autoload = reopened.index().blob_offsets(ElementType::Way, 100).unwrap();

    let consumer = Arc::new(Recorder::default());
    let expected_hits = Arc::new(AtomicUsize::new(0));
    for offset in &offsets_from_autoload {
        reopened.parse_blob(&*consumer, *offset).unwrap();
    }
    if consumer.way_ids.lock().unwrap().contains(&100) {
        expected_hits.fetch_add(1, Ordering::SeqCst);
    }

    assert!(expected_hits.load(Ordering::SeqCst) > 0);
}

fn index_sidecar_path(source: &std::path::Path) -> std::path::PathBuf {
    let mut path = source.as_os_str().to_owned();
    path.push(".idx");
    std::path::PathBuf::from(path)
}
