//! Library for splitting files into chunks and merging them back
//!
//! This library provides modules for:
//! - Cutting files into fixed-size chunks, optionally persisted to disk
//! - Locating and merging persisted chunks into a single file

pub mod file_splitter;
pub mod chunk_merger;

// Re-export commonly used types and structs
pub use file_splitter::{cut_file, ChunkStream, CutConfig, FileChunk, FileSplitter, CHUNK_MARKER};
pub use chunk_merger::{ChunkMerger, MergeSummary, CHUNK_MERGER};
