// Headless row widgets
// Plain in-memory stand-ins for a toolkit's label and picture widgets

use image::{DynamicImage, GenericImageView};

use super::grid_adapter::{ImageView, RowInflater, RowSlot, TitleView};

/// Text widget holding the last title written to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    text: String,
}

impl Label {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl TitleView for Label {
    fn set_title(&mut self, title: &str) {
        self.text.clear();
        self.text.push_str(title);
    }
}

/// Image surface holding a copy of the last bitmap written to it.
#[derive(Debug, Clone, Default)]
pub struct Picture {
    image: Option<DynamicImage>,
}

impl Picture {
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }
}

impl ImageView for Picture {
    fn set_image(&mut self, image: &DynamicImage) {
        self.image = Some(image.clone());
    }

    fn clear_image(&mut self) {
        self.image = None;
    }
}

/// Builds a fresh [`Label`]/[`Picture`] pair per row.
#[derive(Debug, Default)]
pub struct HeadlessInflater {
    inflated: usize,
}

impl HeadlessInflater {
    /// Number of rows built so far.
    pub fn inflated_count(&self) -> usize {
        self.inflated
    }
}

impl RowInflater for HeadlessInflater {
    type Title = Label;
    type Image = Picture;

    fn inflate(&mut self, _slot: RowSlot) -> (Label, Picture) {
        self.inflated += 1;
        (Label::default(), Picture::default())
    }
}
