//! Chunk merger
//!
//! Finds every chunk file cut from the same original and concatenates them,
//! in index order, into a target file.

pub mod merger;

pub use merger::{ChunkMerger, MergeSummary, CHUNK_MERGER};
