//! Drives the feeder/worker pipeline that turns a byte source into consumer callbacks.
//!
//! One feeder thread owns the byte source and reads blobs strictly in order; a pool of worker
//! threads decompresses and decodes them in parallel. The calling thread blocks until both have
//! finished and then surfaces the first error observed, the way the teacher crate's examples hand
//! off work to a thread pool rather than reaching for an async runtime.

use crate::decode::decode_primitive_block;
use crate::decompress::{BlobDecoder, DecodedBlock};
use crate::elements::Consumer;
use crate::error::{Error, FormatError};
use crate::frame::{BlockType, FrameReader};
use crate::index::BlobIndex;

use crossbeam_channel::bounded;
use log::{debug, error, warn};

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Invoked once per breakpoint the feeder reaches, with `(breakpoint_index, offset)`. Every
/// registered trigger fires at every breakpoint it's reached, in ascending breakpoint order.
pub type Trigger = Box<dyn Fn(usize, u64) + Send + Sync>;

const REQUIRED_FEATURES: &[&str] = &["OsmSchema-V0.6", "DenseNodes"];

struct Outstanding {
    count: Mutex<u64>,
    drained: Condvar,
    failed: AtomicBool,
}

impl Outstanding {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            drained: Condvar::new(),
            failed: AtomicBool::new(false),
        }
    }

    fn increment(&self) {
        *self.count.lock().unwrap() += 1;
    }

    fn decrement_and_notify(&self) {
        let mut count = self.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    /// Records that a worker or the feeder hit an error, and wakes anyone waiting on
    /// `wait_until_drained` so the pipeline doesn't block forever on work that will now never
    /// be drained (workers that errored out have already stopped consuming the queue).
    fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.drained.notify_all();
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn wait_until_drained(&self) {
        let guard = self.count.lock().unwrap();
        let _guard = self
            .drained
            .wait_while(guard, |count| *count != 0 && !self.failed.load(Ordering::SeqCst))
            .unwrap();
    }
}

/// Runs a full parse: validates the `OSMHeader` block (unless skipped), then drives the
/// feeder/worker pipeline over the remainder of the input until end-of-stream or the first error.
pub fn parse<R, C>(
    frame: Arc<Mutex<FrameReader<R>>>,
    index: Arc<BlobIndex>,
    consumer: Arc<C>,
    queue_size: usize,
    worker_count: usize,
    skip_header_check: bool,
    indexing: bool,
    breakpoints: Vec<u64>,
    triggers: Vec<Trigger>,
) -> Result<(), Error>
where
    R: Read + Send + 'static,
    C: Consumer + 'static,
{
    if !skip_header_check && !check_header(&frame, &index, indexing)? {
        debug!("empty input, nothing to parse");
        return Ok(());
    }

    let (blob_tx, blob_rx) = bounded::<(usize, crate::frame::RawBlob)>(queue_size.max(1));
    let (error_tx, error_rx) = bounded::<Error>(1);
    let outstanding = Arc::new(Outstanding::new());
    let triggers = Arc::new(triggers);

    let feeder = {
        let frame = Arc::clone(&frame);
        let index = Arc::clone(&index);
        let outstanding = Arc::clone(&outstanding);
        let error_tx = error_tx.clone();
        let triggers = Arc::clone(&triggers);

        std::thread::spawn(move || {
            let mut next_breakpoint = 0usize;

            loop {
                if outstanding.has_failed() {
                    break;
                }

                let next = {
                    let mut frame = frame.lock().unwrap();
                    frame.read_blob()
                };

                match next {
                    Ok(None) => break,
                    Ok(Some(raw)) => {
                        let blob_index = if indexing { index.push_blob(raw.start, raw.size) } else { 0 };
                        outstanding.increment();

                        let at_breakpoint =
                            next_breakpoint < breakpoints.len() && raw.start == breakpoints[next_breakpoint];
                        let breakpoint_offset = raw.start;

                        if blob_tx.send((blob_index, raw)).is_err() {
                            break;
                        }

                        if at_breakpoint {
                            outstanding.wait_until_drained();
                            for trigger in triggers.iter() {
                                trigger(next_breakpoint, breakpoint_offset);
                            }
                            next_breakpoint += 1;
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.try_send(e);
                        outstanding.mark_failed();
                        break;
                    }
                }
            }

            drop(blob_tx);
        })
    };

    let pool = threadpool::ThreadPool::new(worker_count.max(1));
    for _ in 0..worker_count.max(1) {
        let blob_rx = blob_rx.clone();
        let index = Arc::clone(&index);
        let consumer = Arc::clone(&consumer);
        let error_tx = error_tx.clone();
        let outstanding = Arc::clone(&outstanding);

        pool.execute(move || {
            let mut decoder = BlobDecoder::default();

            while let Ok((blob_index, raw)) = blob_rx.recv() {
                let result = decode_blob(&mut decoder, &raw, &*consumer, &index, blob_index, indexing);
                outstanding.decrement_and_notify();

                if let Err(e) = result {
                    let _ = error_tx.try_send(e);
                    outstanding.mark_failed();
                    break;
                }
            }
        });
    }

    feeder.join().expect("feeder thread panicked");
    pool.join();
    drop(blob_rx);

    match error_rx.try_recv() {
        Ok(e) => {
            error!("parse aborted: {e}");
            Err(e)
        }
        Err(_) => {
            debug!("parse completed with {} blobs indexed", index.len());
            Ok(())
        }
    }
}

fn decode_blob<C: Consumer>(
    decoder: &mut BlobDecoder,
    raw: &crate::frame::RawBlob,
    consumer: &C,
    index: &BlobIndex,
    blob_index: usize,
    indexing: bool,
) -> Result<(), Error> {
    match decoder.decode(raw)? {
        DecodedBlock::Primitive(block) => {
            let groups = decode_primitive_block(&block, consumer, indexing)?;
            if indexing {
                for group in groups {
                    index.record_group(blob_index, group);
                }
            }
            Ok(())
        }
        DecodedBlock::Header(_) => {
            warn!("unexpected OSMHeader block at offset {} after initial header check", raw.start);
            Ok(())
        }
        DecodedBlock::Unknown => Ok(()),
    }
}

/// Reads and validates the leading `OSMHeader` blob. Returns `Ok(false)` on a clean empty input
/// (no blobs at all), in which case the caller should treat the parse as already complete.
fn check_header<R: Read>(frame: &Arc<Mutex<FrameReader<R>>>, index: &Arc<BlobIndex>, indexing: bool) -> Result<bool, Error> {
    let raw = {
        let mut frame = frame.lock().unwrap();
        match frame.read_blob()? {
            Some(raw) => raw,
            None => return Ok(false),
        }
    };

    if raw.block_type != BlockType::Header {
        return Err(FormatError::InvalidData("expected the first blob to be an OSMHeader block".to_string()).into());
    }

    let mut decoder = BlobDecoder::default();
    match decoder.decode(&raw)? {
        DecodedBlock::Header(header) => {
            for feature in &header.required_features {
                if !REQUIRED_FEATURES.contains(&feature.as_str()) {
                    return Err(Error::UnsupportedFeature(feature.clone()));
                }
            }
        }
        _ => return Err(FormatError::InvalidData("OSMHeader blob did not decode as a header block".to_string()).into()),
    }

    if indexing {
        index.push_blob(raw.start, raw.size);
    }

    Ok(true)
}

/// Parses exactly one blob at `offset`, synchronously on the calling thread. Used for index-driven
/// random access; does not touch the index or run the breakpoint machinery.
pub fn parse_blob<R, C>(frame: &Arc<Mutex<FrameReader<R>>>, consumer: &C, offset: u64) -> Result<(), Error>
where
    R: Read + std::io::Seek,
    C: Consumer,
{
    let raw = {
        let mut frame = frame.lock().unwrap();
        frame.seek_to_offset(offset)?;
        frame.read_blob()?.ok_or(Error::Truncated)?
    };

    let mut decoder = BlobDecoder::default();
    if let DecodedBlock::Primitive(block) = decoder.decode(&raw)? {
        decode_primitive_block(&block, consumer, false)?;
    }

    Ok(())
}
