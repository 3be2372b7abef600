//! Directory scanning for the gallery.
//!
//! - `DirectoryScanner` - Lists the files of the configured directory
//! - `FileHandle` - One discovered file (path + display name)

pub mod file_scanner;

pub use file_scanner::*;
