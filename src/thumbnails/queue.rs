//! Decode worker queue for parallel gallery loads.
//!
//! - Bounded worker pool for thumbnail decoding
//! - Requests carry their scan index so results can be put back in order
//! - A panicking decode is reported as a decode failure for that file
//! - Uses flume for communication between workers and the loading thread

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::config::MAX_WORKERS;
use crate::error::{GalleryError, Result};
use crate::image_loader::ImageLoader;
use crate::models::ImageItem;
use crate::scanner::FileHandle;

/// Maximum number of pending requests in the queue.
const MAX_QUEUE_SIZE: usize = 256;

/// How long an idle worker waits before re-checking the shutdown flag.
const WORKER_POLL: Duration = Duration::from_millis(100);

/// Decode function shared by the workers.
pub type DecodeFn = Arc<dyn Fn(&FileHandle) -> Result<ImageItem> + Send + Sync>;

/// Wrap an [`ImageLoader`] as a [`DecodeFn`].
pub fn decode_with(loader: ImageLoader) -> DecodeFn {
    Arc::new(move |file: &FileHandle| loader.load(file))
}

/// Run `decode`, turning a panic into a `Decode` error for `file`.
pub fn decode_guarded(decode: &DecodeFn, file: &FileHandle) -> Result<ImageItem> {
    match panic::catch_unwind(AssertUnwindSafe(|| decode(file))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(&*payload);
            warn!(path = ?file.path, reason, "Decoder panicked");
            Err(GalleryError::Decode {
                path: file.path.clone(),
                reason: format!("decoder panicked: {reason}"),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// A request to decode one scanned file.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    /// Position of the file in the scan listing.
    pub index: usize,
    pub file: FileHandle,
}

/// Outcome of one decode, sent back to the loading thread.
#[derive(Debug)]
pub struct DecodeResult {
    pub index: usize,
    pub file: FileHandle,
    pub outcome: Result<ImageItem>,
}

/// Worker pool that decodes files with a shared [`DecodeFn`].
pub struct DecodeQueue {
    /// Sender for new requests. Dropped on shutdown so workers drain and exit.
    request_tx: Option<Sender<DecodeRequest>>,
    /// Receiver for completed results.
    result_rx: Receiver<DecodeResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
}

impl DecodeQueue {
    /// Start a queue with `workers` threads (clamped to `1..=MAX_WORKERS`).
    pub fn new(workers: usize, loader: ImageLoader) -> Result<Self> {
        Self::with_decoder(workers, decode_with(loader))
    }

    /// Start a queue whose workers call `decode` for every request.
    pub fn with_decoder(workers: usize, decode: DecodeFn) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));
        let active_workers = Arc::new(AtomicUsize::new(0));

        let mut queue = Self {
            request_tx: Some(request_tx),
            result_rx,
            workers: Vec::with_capacity(num_workers),
            shutdown,
            active_workers,
        };

        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let shutdown = Arc::clone(&queue.shutdown);
            let active = Arc::clone(&queue.active_workers);
            let decode = Arc::clone(&decode);

            let handle = thread::Builder::new()
                .name(format!("decode-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, rx, tx, shutdown, active, decode))
                .map_err(|e| GalleryError::Worker(format!("failed to spawn worker: {e}")))?;

            queue.workers.push(handle);
        }

        debug!(num_workers, "Started decode worker queue");
        Ok(queue)
    }

    /// Submit a request, blocking while the queue is full.
    pub fn submit(&self, req: DecodeRequest) -> Result<()> {
        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| GalleryError::Worker("decode queue is shut down".into()))?;
        tx.send(req)
            .map_err(|_| GalleryError::Worker("decode queue disconnected".into()))
    }

    /// Wait up to `timeout` for the next completed decode.
    ///
    /// Returns `Ok(None)` on timeout and an error once every worker is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<DecodeResult>> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Ok(Some(result)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(GalleryError::Worker("all decode workers exited".into()))
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Get the number of workers currently decoding.
    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Requests already picked up by a worker finish first; queued ones are
    /// discarded.
    pub fn shutdown(&mut self) {
        debug!("Shutting down decode queue");
        self.shutdown.store(true, Ordering::SeqCst);
        self.request_tx.take();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Decode worker panicked");
            }
        }

        debug!("Decode queue shutdown complete");
    }
}

impl Drop for DecodeQueue {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<DecodeRequest>,
    tx: Sender<DecodeResult>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    decode: DecodeFn,
) {
    debug!(worker_id, "Decode worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(WORKER_POLL) {
            Ok(req) => {
                active.fetch_add(1, Ordering::Relaxed);
                trace!(worker_id, index = req.index, path = ?req.file.path, "Decoding");

                let outcome = decode_guarded(&decode, &req.file);
                let result = DecodeResult {
                    index: req.index,
                    file: req.file,
                    outcome,
                };

                if tx.send(result).is_err() {
                    warn!(worker_id, "Decode result receiver dropped");
                }

                active.fetch_sub(1, Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Decode worker stopped");
}
