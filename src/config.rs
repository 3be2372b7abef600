//! Gallery configuration.
//!
//! The gallery reads a single directory. By default that directory is an
//! application subfolder of the user's pictures directory, resolved via
//! `directories::UserDirs`.

use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use crate::error::{GalleryError, Result};
use crate::scanner::ScanConfig;

/// Default downsampling factor applied to both image dimensions.
pub const DEFAULT_SAMPLE_SIZE: u32 = 8;

/// Default number of decode workers for parallel loads.
pub const DEFAULT_WORKERS: usize = 2;

/// Maximum number of decode workers.
pub const MAX_WORKERS: usize = 8;

/// What a load does when a single file fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Record the failure in the load report and keep going.
    #[default]
    SkipAndContinue,
    /// Abort the whole load on the first failure.
    AbortOnFirstError,
}

/// Configuration for a [`GalleryStore`](crate::models::GalleryStore).
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Directory to scan.
    pub directory: PathBuf,
    /// Integer divisor applied to both image dimensions during decode.
    pub sample_size: u32,
    /// Per-file failure handling.
    pub policy: LoadPolicy,
    /// Directory listing options.
    pub scan: ScanConfig,
    /// Decode workers used by parallel and background loads.
    pub workers: usize,
}

impl GalleryConfig {
    /// Creates a configuration reading `directory` with default settings.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            policy: LoadPolicy::default(),
            scan: ScanConfig::default(),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Creates a configuration for `<pictures>/<folder>`.
    pub fn for_app_folder(folder: &str) -> Result<Self> {
        let pictures = Self::pictures_dir()?;
        let directory = pictures.join(folder);
        debug!(?directory, "Resolved gallery directory");
        Ok(Self::new(directory))
    }

    /// The user's public pictures directory.
    pub fn pictures_dir() -> Result<PathBuf> {
        let dirs = UserDirs::new().ok_or_else(|| {
            GalleryError::InvalidConfig("failed to determine user directories".into())
        })?;
        dirs.picture_dir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GalleryError::InvalidConfig("no pictures directory".into()))
    }

    pub fn with_sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Checks the values a load depends on.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(GalleryError::InvalidConfig(
                "sample size must be at least 1".into(),
            ));
        }
        if self.workers == 0 {
            return Err(GalleryError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Worker count clamped to the supported range.
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}
