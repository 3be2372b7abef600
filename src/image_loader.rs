//! Image decoding for gallery thumbnails.
//!
//! Files are decoded by content sniffing rather than extension. Decoded images
//! are reduced by an integer sample size through sparse pixel sampling, which
//! keeps every `sample_size`-th pixel in both directions.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder, ImageReader, Limits};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use tracing::trace;

use crate::config::DEFAULT_SAMPLE_SIZE;
use crate::error::GalleryError;
use crate::models::ImageItem;
use crate::scanner::FileHandle;

/// Largest width or height accepted from any decoder.
pub const MAX_IMAGE_DIMENSION: u32 = 16_384;

/// Decoder limits applied to every file: bounded dimensions plus the
/// library's default allocation cap.
pub fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits
}

pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    decode_bytes(bytes, path)
}

fn decode_bytes(bytes: Vec<u8>, path: &Path) -> Result<DynamicImage> {
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let mut decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        // The frame iterator composites onto a canvas the size of the
        // logical screen, so the header is checked before any frame is read.
        let (width, height) = decoder.dimensions();
        decoder.set_limits(decode_limits()).with_context(|| {
            format!("GIF exceeds decode limits ({}x{}): {:?}", width, height, path)
        })?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames: {:?}", path));
    }

    match format {
        Some(fmt) => {
            let mut reader = ImageReader::with_format(Cursor::new(&bytes), fmt);
            reader.limits(decode_limits());
            reader
                .decode()
                .with_context(|| format!("Failed to decode image: {:?}", path))
        }
        None => image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
    }
}

/// Output dimensions for a source dimension reduced by `sample_size`.
pub fn sampled_dimension(src: u32, sample_size: u32) -> u32 {
    let sample_size = sample_size.max(1);
    src.div_ceil(sample_size).max(1)
}

/// Keep every `sample_size`-th pixel of `img` in both directions.
pub fn subsample(img: DynamicImage, sample_size: u32) -> DynamicImage {
    if sample_size <= 1 {
        return img;
    }

    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return img;
    }

    let width = sampled_dimension(src_w, sample_size);
    let height = sampled_dimension(src_h, sample_size);
    let sampled = RgbaImage::from_fn(width, height, |x, y| {
        img.get_pixel(x * sample_size, y * sample_size)
    });
    DynamicImage::ImageRgba8(sampled)
}

/// Decodes gallery files into downsampled [`ImageItem`]s.
#[derive(Debug, Clone, Copy)]
pub struct ImageLoader {
    sample_size: u32,
}

impl ImageLoader {
    pub fn new(sample_size: u32) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Decode one file into an item titled with the file's base name.
    pub fn load(&self, file: &FileHandle) -> Result<ImageItem, GalleryError> {
        trace!(path = ?file.path, sample_size = self.sample_size, "Decoding image");
        let img = open_image(&file.path).map_err(|e| GalleryError::decode(&file.path, &e))?;
        let thumb = subsample(img, self.sample_size);
        Ok(ImageItem::new(thumb, file.name.clone(), file.path.clone()))
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}
