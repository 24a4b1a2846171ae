//! Errors returned by this crate.

/// Possible errors returned by the library.
#[derive(Debug)]
pub enum Error {
    /// Reading from, or seeking in, the underlying byte source failed.
    Io(std::io::Error),
    /// A read stopped before a framed blob was fully consumed.
    Truncated,
    /// The bytes of a blob could not be interpreted as the message they were declared to be.
    Format(FormatError),
    /// A blob declared a compression method this crate does not implement.
    UnsupportedCompression,
    /// The input requires a feature this crate does not implement (legacy `Node` primitives, or
    /// an OSM header `required_features` entry we don't recognize).
    UnsupportedFeature(String),
    /// A block index lookup found no matching entry.
    NotFound,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Truncated => write!(f, "truncated read mid-blob"),
            Error::Format(e) => write!(f, "format error: {e}"),
            Error::UnsupportedCompression => write!(f, "unsupported compression method"),
            Error::UnsupportedFeature(feature) => write!(f, "unsupported feature: {feature}"),
            Error::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Format(FormatError::Decode(e))
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}

/// The different ways a blob or primitive block can fail to parse despite being syntactically
/// valid protobuf (or can fail to even be that).
#[derive(Debug)]
pub enum FormatError {
    /// The bytes are not a valid encoding of the expected protobuf message.
    Decode(prost::DecodeError),
    /// A blob declared `raw_size` that didn't match the number of bytes actually produced.
    SizeMismatch { expected: usize, actual: usize },
    /// `BlobHeaderLength` was negative or absurdly large.
    InvalidBlobHeader,
    /// `BlobHeader.datasize` was negative or absurdly large.
    InvalidBlobData,
    /// A `PrimitiveGroup` had none of `dense`/`ways`/`relations`/`nodes` populated.
    UnrecognizedPrimitiveGroup,
    /// A key/value/role index pointed outside of the block's string table.
    StringIndexOutOfRange { index: usize, len: usize },
    /// A data-level invariant was violated (e.g. dense node array length mismatch).
    InvalidData(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Decode(e) => write!(f, "protobuf decode error: {e}"),
            FormatError::SizeMismatch { expected, actual } => {
                write!(f, "decompressed size mismatch: expected {expected}, got {actual}")
            }
            FormatError::InvalidBlobHeader => write!(f, "invalid blob header length"),
            FormatError::InvalidBlobData => write!(f, "invalid blob data size"),
            FormatError::UnrecognizedPrimitiveGroup => write!(f, "primitive group has no recognized payload"),
            FormatError::StringIndexOutOfRange { index, len } => {
                write!(f, "string table index {index} out of range (table has {len} entries)")
            }
            FormatError::InvalidData(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

pub type Result<T> = std::result::Result<T, Error>;
