//! In-memory store of decoded gallery images.
//!
//! This module provides the `GalleryStore` struct which handles:
//! - Loading the configured directory (scan, then decode every entry)
//! - Publishing the loaded sequence with a swap-on-load so readers never see
//!   a half-built gallery
//! - Index lookups with explicit out-of-range errors
//! - Background loads with progress reporting and cancellation

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::{GalleryConfig, LoadPolicy};
use crate::error::{GalleryError, Result};
use crate::image_loader::ImageLoader;
use crate::models::ImageItem;
use crate::scanner::{DirectoryScanner, FileHandle};
use crate::thumbnails::{
    decode_guarded, decode_with, DecodeFn, DecodeQueue, DecodeRequest, DecodeResult,
};

/// Interval at which a parallel load re-checks for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// A published gallery sequence.
pub type ItemList = Arc<Vec<Arc<ImageItem>>>;

/// Shared flag used to stop an in-flight load.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress information sent during a background load.
#[derive(Debug, Clone)]
pub enum LoadProgress {
    /// Loading has started.
    Started { path: PathBuf },
    /// The directory listing is complete.
    Scanned { count: usize },
    /// A file was decoded. `index` is its position in the scan listing.
    ///
    /// Sent as each file finishes, so parallel loads report in completion order.
    Decoded { index: usize, path: PathBuf },
    /// A file failed to decode and was skipped.
    Failed { path: PathBuf, error: String },
    /// Loading completed and the new sequence is published.
    Completed { loaded: usize, failed: usize },
}

/// A file that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: GalleryError,
}

/// Result of a completed load.
#[derive(Debug)]
pub struct LoadReport {
    /// The sequence now published by the store.
    pub items: ItemList,
    /// Files skipped under [`LoadPolicy::SkipAndContinue`].
    pub failures: Vec<LoadFailure>,
    /// Store generation after this load.
    pub generation: u64,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.items.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeMode {
    Sequential,
    Parallel,
}

struct Published {
    items: ItemList,
    generation: u64,
}

type ProgressTx = mpsc::UnboundedSender<LoadProgress>;

fn emit(progress: Option<&ProgressTx>, event: LoadProgress) {
    if let Some(tx) = progress {
        // The receiver may have been dropped; progress is best effort.
        let _ = tx.send(event);
    }
}

/// Ordered, index-addressable gallery of decoded images.
pub struct GalleryStore {
    config: GalleryConfig,
    published: RwLock<Published>,
    /// Serialises loads; readers never take it.
    load_lock: Mutex<()>,
}

impl GalleryStore {
    /// Creates an empty store. Nothing is read until a load is requested.
    pub fn new(config: GalleryConfig) -> Self {
        Self {
            config,
            published: RwLock::new(Published {
                items: Arc::new(Vec::new()),
                generation: 0,
            }),
            load_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// Loads the directory on the calling thread, replacing the current sequence.
    pub fn load(&self) -> Result<LoadReport> {
        self.run_load(DecodeMode::Sequential, self.decode_fn(), &CancelToken::new(), None)
    }

    /// Like [`load`](Self::load), stopping with `Cancelled` once `cancel` is set.
    pub fn load_cancellable(&self, cancel: &CancelToken) -> Result<LoadReport> {
        self.run_load(DecodeMode::Sequential, self.decode_fn(), cancel, None)
    }

    /// Loads the directory, decoding on the worker pool.
    ///
    /// Blocks until every file is processed. The published order is the scan
    /// order, as with [`load`](Self::load).
    pub fn load_parallel(&self) -> Result<LoadReport> {
        self.run_load(DecodeMode::Parallel, self.decode_fn(), &CancelToken::new(), None)
    }

    /// Starts a load on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_load(self: &Arc<Self>) -> LoadHandle {
        self.spawn_load_with(CancelToken::new())
    }

    /// Starts a background load controlled by an existing cancel token.
    pub fn spawn_load_with(self: &Arc<Self>, cancel: CancelToken) -> LoadHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::clone(self);
        let token = cancel.clone();
        let decode = self.decode_fn();

        let handle = task::spawn_blocking(move || {
            store.run_load(DecodeMode::Parallel, decode, &token, Some(&tx))
        });

        LoadHandle {
            progress: rx,
            cancel,
            handle,
        }
    }

    /// Returns the item at `index` of the most recent load.
    pub fn item_at(&self, index: usize) -> Result<Arc<ImageItem>> {
        let published = self.published.read();
        published
            .items
            .get(index)
            .cloned()
            .ok_or(GalleryError::IndexOutOfRange {
                index,
                count: published.items.len(),
            })
    }

    pub fn count(&self) -> usize {
        self.published.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot of the current sequence.
    pub fn items(&self) -> ItemList {
        Arc::clone(&self.published.read().items)
    }

    /// Number of successful loads so far. Changes whenever the sequence is replaced.
    pub fn generation(&self) -> u64 {
        self.published.read().generation
    }

    fn run_load(
        &self,
        mode: DecodeMode,
        decode: DecodeFn,
        cancel: &CancelToken,
        progress: Option<&ProgressTx>,
    ) -> Result<LoadReport> {
        self.config.validate()?;
        let _guard = self.load_lock.lock();

        let dir = &self.config.directory;
        info!(?dir, ?mode, "Loading gallery");
        emit(
            progress,
            LoadProgress::Started {
                path: dir.clone(),
            },
        );

        if cancel.is_cancelled() {
            return Err(GalleryError::Cancelled);
        }

        let files = DirectoryScanner::with_config(dir, self.config.scan.clone()).scan()?;
        emit(progress, LoadProgress::Scanned { count: files.len() });

        let (items, failures) = match mode {
            DecodeMode::Sequential => self.decode_sequential(files, decode, cancel, progress)?,
            DecodeMode::Parallel => self.decode_parallel(files, decode, cancel, progress)?,
        };

        let items: ItemList = Arc::new(items);
        let generation = self.publish(Arc::clone(&items));

        info!(
            "Gallery load complete: {} loaded, {} failed",
            items.len(),
            failures.len()
        );
        emit(
            progress,
            LoadProgress::Completed {
                loaded: items.len(),
                failed: failures.len(),
            },
        );

        Ok(LoadReport {
            items,
            failures,
            generation,
        })
    }

    fn decode_sequential(
        &self,
        files: Vec<FileHandle>,
        decode: DecodeFn,
        cancel: &CancelToken,
        progress: Option<&ProgressTx>,
    ) -> Result<(Vec<Arc<ImageItem>>, Vec<LoadFailure>)> {
        let mut items = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        for (index, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("Load cancelled");
                return Err(GalleryError::Cancelled);
            }

            match decode_guarded(&decode, &file) {
                Ok(item) => {
                    emit(
                        progress,
                        LoadProgress::Decoded {
                            index,
                            path: file.path,
                        },
                    );
                    items.push(Arc::new(item));
                }
                Err(e) => failures.push(self.check_failure(file, e, progress)?),
            }
        }

        Ok((items, failures))
    }

    fn decode_parallel(
        &self,
        files: Vec<FileHandle>,
        decode: DecodeFn,
        cancel: &CancelToken,
        progress: Option<&ProgressTx>,
    ) -> Result<(Vec<Arc<ImageItem>>, Vec<LoadFailure>)> {
        let total = files.len();
        if total == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let queue = DecodeQueue::with_decoder(self.config.effective_workers(), decode)?;
        for (index, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(GalleryError::Cancelled);
            }
            queue.submit(DecodeRequest { index, file })?;
        }

        // Progress goes out in completion order; slots restore scan order.
        let mut slots: Vec<Option<std::result::Result<ImageItem, LoadFailure>>> =
            (0..total).map(|_| None).collect();
        let mut received = 0;
        while received < total {
            if cancel.is_cancelled() {
                debug!(received, total, "Parallel load cancelled");
                return Err(GalleryError::Cancelled);
            }
            let Some(DecodeResult {
                index,
                file,
                outcome,
            }) = queue.recv_timeout(CANCEL_POLL)?
            else {
                continue;
            };
            received += 1;

            let slot = match outcome {
                Ok(item) => {
                    emit(
                        progress,
                        LoadProgress::Decoded {
                            index,
                            path: file.path,
                        },
                    );
                    Ok(item)
                }
                Err(e) => Err(self.check_failure(file, e, progress)?),
            };
            slots[index] = Some(slot);
        }
        drop(queue);

        let mut items = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for slot in slots.into_iter().flatten() {
            match slot {
                Ok(item) => items.push(Arc::new(item)),
                Err(failure) => failures.push(failure),
            }
        }

        Ok((items, failures))
    }

    /// Applies the load policy to a failed file.
    ///
    /// Returns the error itself when the load must stop.
    fn check_failure(
        &self,
        file: FileHandle,
        error: GalleryError,
        progress: Option<&ProgressTx>,
    ) -> Result<LoadFailure> {
        if self.config.policy == LoadPolicy::AbortOnFirstError || !error.is_per_file() {
            warn!(path = ?file.path, %error, "Aborting gallery load");
            return Err(error);
        }

        warn!(path = ?file.path, %error, "Skipping unreadable file");
        emit(
            progress,
            LoadProgress::Failed {
                path: file.path.clone(),
                error: error.to_string(),
            },
        );
        Ok(LoadFailure {
            path: file.path,
            error,
        })
    }

    fn decode_fn(&self) -> DecodeFn {
        decode_with(ImageLoader::new(self.config.sample_size))
    }

    fn publish(&self, items: ItemList) -> u64 {
        let mut published = self.published.write();
        published.items = items;
        published.generation += 1;
        published.generation
    }
}

/// Handle to a background load started with [`GalleryStore::spawn_load`].
pub struct LoadHandle {
    progress: mpsc::UnboundedReceiver<LoadProgress>,
    cancel: CancelToken,
    handle: task::JoinHandle<Result<LoadReport>>,
}

impl LoadHandle {
    /// Request the load to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next progress event, or `None` once the load has finished.
    pub async fn next_progress(&mut self) -> Option<LoadProgress> {
        self.progress.recv().await
    }

    /// Wait for the load to finish.
    pub async fn join(self) -> Result<LoadReport> {
        self.handle
            .await
            .map_err(|e| GalleryError::Worker(format!("load task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn fake_item(file: &FileHandle) -> ImageItem {
        ImageItem::new(DynamicImage::new_rgb8(1, 1), file.name.clone(), file.path.clone())
    }

    /// Decoder whose `block_at`-th call signals `started` and waits for `release`.
    fn gated_decoder(block_at: usize) -> (DecodeFn, flume::Receiver<()>, flume::Sender<()>) {
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded::<()>();
        let calls = AtomicUsize::new(0);
        let decode: DecodeFn = Arc::new(move |file: &FileHandle| {
            if calls.fetch_add(1, Ordering::SeqCst) == block_at {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            }
            Ok(fake_item(file))
        });
        (decode, started_rx, release_tx)
    }

    fn wait_for_decoded(
        rx: &mut mpsc::UnboundedReceiver<LoadProgress>,
        want: usize,
    ) -> Vec<usize> {
        let deadline = Instant::now() + WAIT;
        let mut indices = Vec::new();
        while indices.len() < want && Instant::now() < deadline {
            match rx.try_recv() {
                Ok(LoadProgress::Decoded { index, .. }) => indices.push(index),
                Ok(_) => {}
                Err(_) => thread::sleep(Duration::from_millis(5)),
            }
        }
        indices
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]));
        img.save(dir.join(name)).unwrap();
    }

    fn write_corrupt(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"\x89PNG but not really").unwrap();
    }

    fn store_for(dir: &Path) -> GalleryStore {
        GalleryStore::new(GalleryConfig::new(dir))
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let store = store_for(dir.path());
        assert_eq!(store.count(), 0);
        assert!(store.is_empty());
        assert_eq!(store.generation(), 0);
        assert!(matches!(
            store.item_at(0),
            Err(GalleryError::IndexOutOfRange { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = tempdir().unwrap();
        let store = store_for(dir.path());
        let report = store.load().unwrap();
        assert_eq!(report.loaded(), 0);
        assert!(report.is_clean());
        assert_eq!(store.count(), 0);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempdir().unwrap();
        let store = store_for(&dir.path().join("missing"));
        assert!(matches!(
            store.load(),
            Err(GalleryError::DirectoryUnavailable { .. })
        ));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_load_preserves_scan_order() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            write_png(dir.path(), &format!("img_{i}.png"), 16, 16);
        }

        let scanned = DirectoryScanner::new(dir.path()).scan().unwrap();
        let store = store_for(dir.path());
        store.load().unwrap();

        assert_eq!(store.count(), scanned.len());
        for (index, file) in scanned.iter().enumerate() {
            let item = store.item_at(index).unwrap();
            assert_eq!(item.title(), file.name);
            assert_eq!(item.dimensions(), (2, 2));
        }
        assert!(matches!(
            store.item_at(scanned.len()),
            Err(GalleryError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_skip_and_continue() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        write_corrupt(dir.path(), "broken.png");
        write_png(dir.path(), "b.png", 8, 8);

        let store = store_for(dir.path());
        let report = store.load().unwrap();

        assert_eq!(store.count(), 2);
        assert_eq!(report.loaded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].path, dir.path().join("broken.png"));
        assert!(matches!(
            report.failures[0].error,
            GalleryError::Decode { .. }
        ));
    }

    #[test]
    fn test_abort_policy_keeps_previous_sequence() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);

        let config = GalleryConfig::new(dir.path()).with_policy(LoadPolicy::AbortOnFirstError);
        let store = GalleryStore::new(config);
        store.load().unwrap();
        assert_eq!(store.count(), 1);

        write_corrupt(dir.path(), "broken.png");
        assert!(matches!(store.load(), Err(GalleryError::Decode { .. })));
        assert_eq!(store.count(), 1);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_reload_replaces_sequence() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        let store = store_for(dir.path());
        store.load().unwrap();
        let before = store.items();

        write_png(dir.path(), "b.png", 8, 8);
        let report = store.load().unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.count(), 2);
        assert_eq!(report.generation, 2);
        assert!(!Arc::ptr_eq(&before, &store.items()));
    }

    #[test]
    fn test_configured_sample_size() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 20);
        let store = GalleryStore::new(GalleryConfig::new(dir.path()).with_sample_size(4));
        store.load().unwrap();
        assert_eq!(store.item_at(0).unwrap().dimensions(), (10, 5));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let store = GalleryStore::new(GalleryConfig::new(dir.path()).with_sample_size(0));
        assert!(matches!(store.load(), Err(GalleryError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancelled_load_keeps_previous_sequence() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        let store = store_for(dir.path());
        store.load().unwrap();

        write_png(dir.path(), "b.png", 8, 8);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            store.load_cancellable(&token),
            Err(GalleryError::Cancelled)
        ));
        assert_eq!(store.count(), 1);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential_order() {
        let dir = tempdir().unwrap();
        for i in 0..12 {
            write_png(dir.path(), &format!("p{i:02}.png"), 16, 8);
        }
        write_corrupt(dir.path(), "zz.png");

        let store = GalleryStore::new(GalleryConfig::new(dir.path()).with_workers(3));
        let sequential: Vec<String> = {
            store.load().unwrap();
            store.items().iter().map(|i| i.title().to_string()).collect()
        };
        let report = store.load_parallel().unwrap();
        let parallel: Vec<String> = report.items.iter().map(|i| i.title().to_string()).collect();

        assert_eq!(parallel, sequential);
        assert_eq!(report.loaded(), 12);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_spawn_load_reports_progress() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        write_png(dir.path(), "b.png", 8, 8);
        write_corrupt(dir.path(), "c.png");

        let store = Arc::new(store_for(dir.path()));
        let mut handle = store.spawn_load();

        let mut events = Vec::new();
        while let Some(event) = handle.next_progress().await {
            events.push(event);
        }
        let report = handle.join().await.unwrap();

        assert_eq!(report.loaded(), 2);
        assert_eq!(store.count(), 2);
        assert!(matches!(events.first(), Some(LoadProgress::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(LoadProgress::Completed {
                loaded: 2,
                failed: 1
            })
        ));
        let decoded = events
            .iter()
            .filter(|e| matches!(e, LoadProgress::Decoded { .. }))
            .count();
        assert_eq!(decoded, 2);
    }

    #[tokio::test]
    async fn test_spawn_load_cancelled() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);

        let store = Arc::new(store_for(dir.path()));
        let token = CancelToken::new();
        token.cancel();
        let handle = store.spawn_load_with(token);

        assert!(matches!(handle.join().await, Err(GalleryError::Cancelled)));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_parallel_progress_sent_as_files_finish() {
        let dir = tempdir().unwrap();
        for i in 0..4 {
            write_png(dir.path(), &format!("f{i}.png"), 4, 4);
        }
        let store = Arc::new(GalleryStore::new(
            GalleryConfig::new(dir.path()).with_workers(1),
        ));

        let (decode, started, release) = gated_decoder(2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let loading = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.run_load(DecodeMode::Parallel, decode, &CancelToken::new(), Some(&tx))
            })
        };

        // The third decode is held back; the first two must already be reported.
        started.recv_timeout(WAIT).unwrap();
        assert_eq!(wait_for_decoded(&mut rx, 2), vec![0, 1]);
        assert_eq!(store.generation(), 0);

        release.send(()).unwrap();
        let report = loading.join().unwrap().unwrap();
        assert_eq!(report.loaded(), 4);
        assert_eq!(wait_for_decoded(&mut rx, 2), vec![2, 3]);
    }

    #[test]
    fn test_parallel_decoder_panic_skips_file() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4);
        write_png(dir.path(), "bomb.png", 4, 4);
        write_png(dir.path(), "c.png", 4, 4);
        let store = GalleryStore::new(GalleryConfig::new(dir.path()).with_workers(2));

        let decode: DecodeFn = Arc::new(|file: &FileHandle| {
            if file.name == "bomb.png" {
                panic!("codec exploded");
            }
            Ok(fake_item(file))
        });
        let report = store
            .run_load(DecodeMode::Parallel, decode, &CancelToken::new(), None)
            .unwrap();

        assert_eq!(report.loaded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].path, dir.path().join("bomb.png"));
        assert!(report.failures[0]
            .error
            .to_string()
            .contains("codec exploded"));
    }

    #[test]
    fn test_parallel_abort_stops_early() {
        let dir = tempdir().unwrap();
        for i in 0..16 {
            write_png(dir.path(), &format!("f{i:02}.png"), 4, 4);
        }
        let config = GalleryConfig::new(dir.path())
            .with_workers(1)
            .with_policy(LoadPolicy::AbortOnFirstError);
        let store = GalleryStore::new(config);

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let decode: DecodeFn = Arc::new(move |file: &FileHandle| {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(GalleryError::Decode {
                    path: file.path.clone(),
                    reason: "truncated".into(),
                });
            }
            thread::sleep(Duration::from_millis(20));
            Ok(fake_item(file))
        });

        let result = store.run_load(DecodeMode::Parallel, decode, &CancelToken::new(), None);
        assert!(matches!(result, Err(GalleryError::Decode { .. })));
        assert!(calls.load(Ordering::SeqCst) < 16);
        assert_eq!(store.generation(), 0);
    }

    fn cancel_mid_load(mode: DecodeMode) {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        write_png(dir.path(), "b.png", 8, 8);
        let store = Arc::new(GalleryStore::new(
            GalleryConfig::new(dir.path()).with_workers(1),
        ));
        store.load().unwrap();

        write_png(dir.path(), "c.png", 8, 8);
        let (decode, started, release) = gated_decoder(1);
        let token = CancelToken::new();
        let loading = {
            let store = Arc::clone(&store);
            let token = token.clone();
            thread::spawn(move || store.run_load(mode, decode, &token, None))
        };

        started.recv_timeout(WAIT).unwrap();
        token.cancel();
        release.send(()).unwrap();

        assert!(matches!(
            loading.join().unwrap(),
            Err(GalleryError::Cancelled)
        ));
        assert_eq!(store.count(), 2);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_sequential_cancel_mid_load() {
        cancel_mid_load(DecodeMode::Sequential);
    }

    #[test]
    fn test_parallel_cancel_mid_load() {
        cancel_mid_load(DecodeMode::Parallel);
    }

    #[test]
    fn test_readers_see_previous_sequence_during_load() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 8, 8);
        write_png(dir.path(), "b.png", 8, 8);
        let store = Arc::new(store_for(dir.path()));
        store.load().unwrap();
        let before = store.items();

        write_png(dir.path(), "c.png", 8, 8);
        write_png(dir.path(), "d.png", 8, 8);
        let (decode, started, release) = gated_decoder(0);
        let loading = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.run_load(DecodeMode::Sequential, decode, &CancelToken::new(), None)
            })
        };

        started.recv_timeout(WAIT).unwrap();
        assert_eq!(store.count(), 2);
        assert!(Arc::ptr_eq(&store.items(), &before));
        assert_eq!(store.item_at(1).unwrap().title(), before[1].title());
        assert!(matches!(
            store.item_at(2),
            Err(GalleryError::IndexOutOfRange { index: 2, count: 2 })
        ));

        release.send(()).unwrap();
        let report = loading.join().unwrap().unwrap();
        assert_eq!(report.loaded(), 4);
        assert_eq!(store.count(), 4);
        assert_eq!(store.generation(), 2);
    }
}
