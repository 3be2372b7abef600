pub mod gallery_store;
pub mod image_item;

pub use gallery_store::*;
pub use image_item::*;
