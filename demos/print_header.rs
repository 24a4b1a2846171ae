use pbfstream::decompress::{BlobDecoder, DecodedBlock};
use pbfstream::frame::FrameReader;

use std::fs::File;
use std::io::BufReader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pbf_path = std::env::args()
        .nth(1)
        .expect("Expected an OSM PBF file as first argument");

    let file = File::open(pbf_path)?;
    let mut frame = FrameReader::new(BufReader::new(file));
    let mut decoder = BlobDecoder::default();

    while let Some(raw) = frame.read_blob()? {
        if let DecodedBlock::Header(header_block) = decoder.decode(&raw)? {
            println!("{:#?}", header_block);
            break;
        }
    }

    Ok(())
}
