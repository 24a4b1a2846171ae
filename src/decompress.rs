//! Decompressing a [`RawBlob`] into a decoded [`pbf::HeaderBlock`] or [`pbf::PrimitiveBlock`].
//!
//! This holds no shared state, so each worker thread owns its own [`BlobDecoder`] (the way the
//! teacher crate's `BlockParser` is documented to be made thread-local) to reuse its scratch
//! buffer across blobs without repeated allocation.

use crate::error::{Error, FormatError};
use crate::frame::{BlockType, RawBlob};
use crate::pbf;

use prost::Message;

#[cfg(feature = "flate2")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "flate2")]
use std::io::Read;

/// Result of [`BlobDecoder::decode`].
pub enum DecodedBlock {
    Header(pbf::HeaderBlock),
    Primitive(pbf::PrimitiveBlock),
    Unknown,
}

/// Decompresses a `Blob`'s payload into the preallocated `output` buffer.
pub trait Decompressor {
    fn decompress(zlib_data: &[u8], output: &mut Vec<u8>) -> Result<(), Error>;
}

/// The default decompressor. Supports zlib if the `flate2` feature is enabled (on by default);
/// any other compression method, and zlib itself with the feature disabled, is unsupported.
pub struct DefaultDecompressor;

impl Decompressor for DefaultDecompressor {
    #[cfg(feature = "flate2")]
    fn decompress(zlib_data: &[u8], output: &mut Vec<u8>) -> Result<(), Error> {
        let mut decoder = ZlibDecoder::new(zlib_data);
        decoder.read_to_end(output).map_err(|_| FormatError::InvalidBlobData)?;
        Ok(())
    }

    #[cfg(not(feature = "flate2"))]
    fn decompress(_zlib_data: &[u8], _output: &mut Vec<u8>) -> Result<(), Error> {
        Err(Error::UnsupportedCompression)
    }
}

/// Decompressor and protobuf decoder with an internal scratch buffer for decompressed bytes.
///
/// When multiple worker threads decode blobs in parallel, each should own its own `BlobDecoder`
/// so the scratch buffer stays warm without being shared (and thus without contention).
pub struct BlobDecoder<D: Decompressor = DefaultDecompressor> {
    scratch: Vec<u8>,
    decompressor: std::marker::PhantomData<D>,
}

impl Default for BlobDecoder {
    fn default() -> Self {
        BlobDecoder::<DefaultDecompressor>::new()
    }
}

impl<D: Decompressor> BlobDecoder<D> {
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            decompressor: std::marker::PhantomData,
        }
    }

    /// Decompresses and decodes `raw`, returning a header block, a primitive block, or
    /// `Unknown` for any blob type this crate does not interpret.
    pub fn decode(&mut self, raw: &RawBlob) -> Result<DecodedBlock, Error> {
        let blob = pbf::Blob::decode(&*raw.data)?;

        let expected_raw_size = blob.raw_size.map(|n| n as usize);

        self.scratch.clear();
        match blob.data {
            Some(pbf::blob::Data::Raw(raw_data)) => self.scratch.extend_from_slice(&raw_data),
            Some(pbf::blob::Data::ZlibData(zlib_data)) => {
                if let Some(size) = expected_raw_size {
                    self.scratch.reserve(size);
                }
                D::decompress(&zlib_data, &mut self.scratch)?;
            }
            Some(pbf::blob::Data::Lz4Data(_))
            | Some(pbf::blob::Data::LzmaData(_))
            | Some(pbf::blob::Data::ZstdData(_))
            | Some(pbf::blob::Data::ObsoleteBzip2Data(_)) => {
                return Err(Error::UnsupportedCompression);
            }
            None => return Err(FormatError::InvalidBlobData.into()),
        }

        if let Some(expected) = expected_raw_size {
            if expected != self.scratch.len() {
                return Err(FormatError::SizeMismatch {
                    expected,
                    actual: self.scratch.len(),
                }
                .into());
            }
        }

        match raw.block_type {
            BlockType::Header => Ok(DecodedBlock::Header(pbf::HeaderBlock::decode(&*self.scratch)?)),
            BlockType::Data => Ok(DecodedBlock::Primitive(pbf::PrimitiveBlock::decode(&*self.scratch)?)),
            BlockType::Unknown => Ok(DecodedBlock::Unknown),
        }
    }
}
