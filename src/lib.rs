//! Thumbnail gallery for a single picture directory.
//!
//! The pipeline runs scanner, loader, store, then adapter:
//! - `scanner` lists the files of the configured directory
//! - `image_loader` decodes each file into a downsampled [`ImageItem`]
//! - `models` holds the loaded sequence in a [`GalleryStore`]
//! - `ui` binds store positions to recyclable rows through a [`GridAdapter`]

pub mod config;
pub mod error;
pub mod image_loader;
pub mod models;
pub mod scanner;
pub mod thumbnails;
pub mod ui;

pub use config::{GalleryConfig, LoadPolicy};
pub use error::{GalleryError, Result};
pub use image_loader::ImageLoader;
pub use models::{
    CancelToken, GalleryStore, ImageItem, LoadFailure, LoadHandle, LoadProgress, LoadReport,
};
pub use scanner::{DirectoryScanner, FileHandle, ScanConfig};
pub use ui::{GridAdapter, HeadlessInflater, RowSlot, RowState};
