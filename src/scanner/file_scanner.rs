//! File scanner for the gallery directory.
//!
//! This module provides the `DirectoryScanner` struct which handles:
//! - Listing the regular files of one directory using walkdir
//! - Optional recursion and image-extension filtering
//! - Reporting a missing or unreadable directory as `DirectoryUnavailable`
//!
//! Entries are returned in the order the platform lists them. No sorting is
//! applied.

use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{GalleryError, Result};

/// File extensions recognised when `images_only` filtering is enabled.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// Configuration for the directory scanner.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to descend into subdirectories.
    pub recursive: bool,
    /// Only return files with a known image extension.
    pub images_only: bool,
    /// Whether to leave out dot-files.
    pub skip_hidden: bool,
}

/// A file discovered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Full path of the file.
    pub path: PathBuf,
    /// Base name of the file, used as the display title.
    pub name: String,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// Whether the file carries a known image extension.
    pub fn has_image_extension(&self) -> bool {
        is_image_extension(&self.path)
    }
}

/// Check a path's extension against [`IMAGE_EXTENSIONS`], ignoring case.
pub fn is_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Lists the files of a single gallery directory.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    dir: PathBuf,
    config: ScanConfig,
}

impl DirectoryScanner {
    /// Creates a scanner for `dir` with default configuration.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, ScanConfig::default())
    }

    /// Creates a scanner with custom configuration.
    pub fn with_config(dir: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the regular files currently present in the directory.
    pub fn scan(&self) -> Result<Vec<FileHandle>> {
        self.check_directory()?;
        debug!(dir = ?self.dir, config = ?self.config, "Scanning gallery directory");

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let skip_hidden = self.config.skip_hidden;
        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |e| !(skip_hidden && is_hidden(e)));

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // The root itself failing to list means nothing can be scanned.
                    if e.depth() == 0 {
                        return Err(self.unavailable(&e.to_string()));
                    }
                    warn!("Skipping unreadable entry in {:?}: {}", self.dir, e);
                    continue;
                }
            };

            // Symlinks count when they resolve to a regular file.
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let handle = FileHandle::new(entry.into_path());
            if self.config.images_only && !handle.has_image_extension() {
                trace!(path = ?handle.path, "Skipping non-image file");
                continue;
            }

            trace!(path = ?handle.path, "Discovered file");
            files.push(handle);
        }

        info!("Discovered {} files in {:?}", files.len(), self.dir);
        Ok(files)
    }

    fn check_directory(&self) -> Result<()> {
        match std::fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(self.unavailable("not a directory")),
            Err(e) => Err(self.unavailable(&e.to_string())),
        }
    }

    fn unavailable(&self, reason: &str) -> GalleryError {
        warn!(dir = ?self.dir, reason, "Gallery directory unavailable");
        GalleryError::DirectoryUnavailable {
            path: self.dir.clone(),
            reason: reason.to_string(),
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}
