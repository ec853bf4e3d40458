//! # Chunkfile
//!
//! Splits a file into fixed-size chunks and merges them back:
//! - Sequential cutting on a background task, streamed to the caller in order
//! - Optional "fall disk" persistence of every chunk as `<file>.go-stress-chunk.<n>`
//! - Merging from any one chunk path back into a single file
//!
//! ## Example Usage
//!
//! ```no_run
//! use chunkfile::{cut_file, CHUNK_MERGER};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut chunks = cut_file("assets/test1.png", 10 * 1024, true).await?;
//!
//!     let mut first = None;
//!     while let Some(chunk) = chunks.recv().await {
//!         let chunk = chunk.into_result()?;
//!         println!("{}", chunk);
//!         first.get_or_insert(chunk);
//!     }
//!
//!     if let Some(chunk) = first {
//!         let summary = CHUNK_MERGER.merge_from_chunk(&chunk, "assets/new-test.png").await?;
//!         println!("Merged {} chunks", summary.chunks_merged);
//!     }
//!     Ok(())
//! }
//! ```

// Include the modules from the modules directory
#[path = "../modules/mod.rs"]
pub mod modules;

// Re-export everything from modules for easy access
pub use modules::*;

// Re-export commonly used external types for convenience
pub use anyhow::{Context, Result};
pub use tokio;
pub use tracing;

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library information
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
