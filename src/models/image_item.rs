use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

/// A decoded, downsampled gallery image paired with its display title.
#[derive(Debug, Clone)]
pub struct ImageItem {
    image: DynamicImage,
    title: String,
    path: PathBuf,
}

impl ImageItem {
    pub fn new(image: DynamicImage, title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            image,
            title: title.into(),
            path: path.into(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn set_image(&mut self, image: DynamicImage) {
        self.image = image;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Source file the image was decoded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimensions of the decoded (downsampled) bitmap.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.dimensions();
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }
}
