//! Blob-level framing: pulling length-prefixed `(BlobHeader, Blob)` pairs off a byte source.

use crate::error::{Error, FormatError};
use crate::pbf;

use prost::Message;

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};

/// Which kind of payload a [`RawBlob`] carries, without decoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Header,
    Data,
    Unknown,
}

impl From<&str> for BlockType {
    fn from(value: &str) -> Self {
        match value {
            "OSMHeader" => BlockType::Header,
            "OSMData" => BlockType::Data,
            _ => BlockType::Unknown,
        }
    }
}

/// An unparsed, possibly compressed blob, together with its position in the input.
pub struct RawBlob {
    pub block_type: BlockType,
    pub data: Vec<u8>,
    /// Byte offset of the start of this blob's length prefix, from the beginning of the input.
    pub start: u64,
    /// Total number of bytes this blob occupies, including its length prefix and header.
    pub size: u64,
}

/// Reads framed blobs from a seekable byte source, tracking cumulative bytes consumed.
///
/// Only the feeder thread of the parse orchestrator touches a `FrameReader`; it owns the byte
/// source exclusively for the lifetime of a parse.
pub struct FrameReader<R> {
    source: R,
    bytes_read: AtomicU64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            bytes_read: AtomicU64::new(0),
        }
    }

    /// Total bytes consumed from the source since construction or the last [`seek_to_offset`](Self::seek_to_offset).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }

    /// Reads the next framed blob, or `Ok(None)` on a clean end-of-stream before any byte of the
    /// next blob has been consumed.
    pub fn read_blob(&mut self) -> Result<Option<RawBlob>, Error> {
        let start = self.bytes_read();

        let mut header_len_buf = [0u8; 4];
        match self.read_exact_accounted(&mut header_len_buf) {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let header_len = i32::from_be_bytes(header_len_buf);
        if !(0..64 * 1024).contains(&header_len) {
            return Err(FormatError::InvalidBlobHeader.into());
        }

        let mut header_buf = vec![0u8; header_len as usize];
        self.read_exact_accounted(&mut header_buf)
            .map_err(truncate_eof)?;

        let blob_header = pbf::BlobHeader::decode(&*header_buf)?;
        let block_type = BlockType::from(blob_header.r#type.as_str());
        let data_size = blob_header.datasize;
        if !(0..32 * 1024 * 1024).contains(&data_size) {
            return Err(FormatError::InvalidBlobData.into());
        }

        let mut data = vec![0u8; data_size as usize];
        self.read_exact_accounted(&mut data).map_err(truncate_eof)?;

        let size = self.bytes_read() - start;
        Ok(Some(RawBlob {
            block_type,
            data,
            start,
            size,
        }))
    }

    /// Reads exactly `buf.len()` bytes, accounting each chunk into `bytes_read` as it arrives
    /// rather than only on full success, so a short read before an I/O error or a clean EOF still
    /// leaves `bytes_read` correct.
    fn read_exact_accounted(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into()),
                Ok(n) => {
                    filled += n;
                    self.bytes_read.fetch_add(n as u64, Ordering::SeqCst);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn truncate_eof(e: Error) -> Error {
    match e {
        Error::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => Error::Truncated,
        other => other,
    }
}

impl<R: Read + Seek> FrameReader<R> {
    /// Repositions the source to an absolute offset. `bytes_read` is reset to the given offset,
    /// so subsequent breakpoint offsets computed from it remain meaningful only if the caller
    /// does not rely on the pre-seek accumulation.
    pub fn seek_to_offset(&mut self, offset: u64) -> Result<(), Error> {
        self.source.seek(SeekFrom::Start(offset))?;
        self.bytes_read.store(offset, Ordering::SeqCst);
        Ok(())
    }
}
