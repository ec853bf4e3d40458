//! File Splitter
//!
//! Cuts a file into fixed-size chunks on a background task and streams them
//! back in order. Each chunk can optionally be mirrored to its own file named
//! `<original>.<marker>.<index>`.

pub mod types;
pub mod splitter;

// Re-export main types and the FileSplitter
pub use types::*;
pub use splitter::{cut_file, ChunkStream, FileSplitter};
