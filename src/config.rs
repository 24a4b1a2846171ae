//! Tunables for a parse run.

/// Configuration for [`crate::reader::PbfDecoder::parse`].
///
/// Constructed with [`ParseConfig::default`] and adjusted with the builder methods, mirroring the
/// teacher crate's preference for explicit, struct-literal-friendly configuration over a flag soup
/// of constructor arguments.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Number of decoded-but-unconsumed blobs the feeder is allowed to have in flight before it
    /// blocks. Bounds peak memory use independent of file size.
    pub queue_size: usize,
    /// Number of worker threads decoding blobs concurrently.
    pub worker_count: usize,
    /// Whether to build (or refresh) a [`crate::index::BlobIndex`] while parsing.
    pub indexing: bool,
    /// Skip validating the `OSMHeader` block's `required_features` before parsing data blocks.
    pub skip_header_check: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            queue_size: 64,
            worker_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            indexing: false,
            skip_header_check: false,
        }
    }
}

impl ParseConfig {
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_indexing(mut self, indexing: bool) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn with_skip_header_check(mut self, skip_header_check: bool) -> Self {
        self.skip_header_check = skip_header_check;
        self
    }
}
