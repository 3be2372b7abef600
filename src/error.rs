use std::path::PathBuf;

/// Errors surfaced by the gallery pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("gallery directory unavailable: {path:?}: {reason}")]
    DirectoryUnavailable { path: PathBuf, reason: String },

    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("load cancelled")]
    Cancelled,

    #[error("worker failure: {0}")]
    Worker(String),
}

impl GalleryError {
    pub(crate) fn decode(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Decode {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    /// True for per-file failures that a skip-and-continue load may tolerate.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;
