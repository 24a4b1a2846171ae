//! The top-level entry point: opens a PBF file, manages its sibling `.idx` file, and drives a parse.

use crate::config::ParseConfig;
use crate::elements::Consumer;
use crate::error::Error;
use crate::frame::FrameReader;
use crate::index::BlobIndex;
use crate::orchestrator::{self, Trigger};

use log::{debug, warn};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn index_path_for(source: &Path) -> PathBuf {
    let mut path = source.as_os_str().to_owned();
    path.push(".idx");
    PathBuf::from(path)
}

/// Reads and optionally indexes a single OSM PBF file.
///
/// Construction via [`PbfDecoder::open`] autoloads a sibling `<path>.idx` index if one exists; a
/// successful, indexing-enabled [`parse`](Self::parse) autosaves it back out. Both conventions are
/// plain best-effort wrappers around [`BlobIndex::read_from`]/[`write_to`](BlobIndex::write_to) —
/// explicit control remains available through [`load_index`](Self::load_index) and
/// [`save_index`](Self::save_index).
pub struct PbfDecoder {
    path: PathBuf,
    frame: Arc<Mutex<FrameReader<BufReader<File>>>>,
    index: Mutex<Arc<BlobIndex>>,
}

impl PbfDecoder {
    /// Opens `path`, autoloading a sibling `.idx` file if present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let frame = FrameReader::new(BufReader::new(file));

        let index = match Self::load_index(&path) {
            Ok(Some(index)) => {
                debug!("autoloaded index from {}", index_path_for(&path).display());
                index
            }
            Ok(None) => BlobIndex::new(),
            Err(e) => {
                warn!("failed to autoload index for {}: {e}", path.display());
                return Err(e);
            }
        };

        Ok(Self {
            path,
            frame: Arc::new(Mutex::new(frame)),
            index: Mutex::new(Arc::new(index)),
        })
    }

    /// The `BlobIndex` built up so far (empty until a parse with indexing enabled has run, unless
    /// autoloaded on [`open`](Self::open)).
    pub fn index(&self) -> Arc<BlobIndex> {
        Arc::clone(&self.index.lock().unwrap())
    }

    /// Runs a full parse against `consumer` per `config`, with no breakpoint triggers registered.
    pub fn parse<C>(&self, consumer: Arc<C>, config: &ParseConfig) -> Result<(), Error>
    where
        C: Consumer + 'static,
    {
        self.parse_with_triggers(consumer, config, Vec::new())
    }

    /// Runs a full parse, invoking every registered trigger once per breakpoint reached, in
    /// ascending breakpoint order, once the feeder has drained all in-flight work up to it.
    pub fn parse_with_triggers<C>(&self, consumer: Arc<C>, config: &ParseConfig, triggers: Vec<Trigger>) -> Result<(), Error>
    where
        C: Consumer + 'static,
    {
        // Breakpoints always come from whatever index is already on hand (autoloaded or built by
        // a previous pass): a fresh, indexing pass rebuilds its own index from scratch rather than
        // appending to that one, so the fresh index itself has no breakpoints yet to offer.
        let breakpoints = self.index.lock().unwrap().breakpoints();

        let index = if config.indexing {
            Arc::new(BlobIndex::new())
        } else {
            Arc::clone(&self.index.lock().unwrap())
        };

        orchestrator::parse(
            Arc::clone(&self.frame),
            Arc::clone(&index),
            consumer,
            config.queue_size,
            config.worker_count,
            config.skip_header_check,
            config.indexing,
            breakpoints,
            triggers,
        )?;

        if config.indexing {
            *self.index.lock().unwrap() = Arc::clone(&index);
            self.save_index(&self.path)?;
        }

        Ok(())
    }

    /// Parses a single blob at `offset` on the calling thread, bypassing the feeder/worker pipeline.
    pub fn parse_blob<C: Consumer>(&self, consumer: &C, offset: u64) -> Result<(), Error> {
        orchestrator::parse_blob(&self.frame, consumer, offset)
    }

    /// Explicitly loads an index from `path`, returning `Ok(None)` if no such file exists.
    pub fn load_index(source_path: &Path) -> Result<Option<BlobIndex>, Error> {
        let index_path = index_path_for(source_path);
        match File::open(&index_path) {
            Ok(file) => Ok(Some(BlobIndex::read_from(BufReader::new(file))?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Explicitly saves the current index to `<source_path>.idx`.
    pub fn save_index(&self, source_path: &Path) -> Result<(), Error> {
        let index_path = index_path_for(source_path);
        let file = File::create(&index_path)?;
        self.index.lock().unwrap().write_to(BufWriter::new(file))?;
        debug!("autosaved index to {}", index_path.display());
        Ok(())
    }
}
