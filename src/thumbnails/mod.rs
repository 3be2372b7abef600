//! Thumbnail decoding pipeline for the gallery.
//!
//! This module provides:
//! - `DecodeQueue` - Worker pool for parallel decoding

pub mod queue;

pub use queue::{decode_guarded, decode_with, DecodeFn, DecodeQueue, DecodeRequest, DecodeResult};
