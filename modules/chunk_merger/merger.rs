use crate::modules::file_splitter::types::{
    chunk_index_in, chunk_name_prefix, original_path_for, FileChunk,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Shared merger instance
pub static CHUNK_MERGER: ChunkMerger = ChunkMerger;

/// Locates the sibling chunks of a file and stitches them back together
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkMerger;

/// What a merge actually wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub chunks_merged: usize,
    pub bytes_written: u64,
}

impl ChunkMerger {
    /// Map every chunk index found next to `original` to its chunk path.
    ///
    /// Entries whose index does not parse are skipped instead of being folded
    /// into index 0.
    pub async fn chunk_paths_for_file(
        &self,
        original: impl AsRef<Path>,
    ) -> Result<BTreeMap<usize, PathBuf>> {
        let original = original.as_ref();
        let dir = match original.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let original_name = original
            .file_name()
            .with_context(|| format!("Original path has no file name: {}", original.display()))?;
        let prefix = chunk_name_prefix(original_name);

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to list chunk directory: {}", dir.display()))?;

        let mut chunks = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
        {
            let file_name = entry.file_name();
            match chunk_index_in(&file_name, &prefix) {
                Some(Some(index)) => {
                    chunks.insert(index, dir.join(&file_name));
                }
                Some(None) => {
                    let skipped = dir.join(&file_name);
                    warn!("Skipping chunk with malformed index: {}", skipped.display());
                }
                None => {}
            }
        }

        debug!("Found {} chunks for {}", chunks.len(), original.display());
        Ok(chunks)
    }

    /// Merge all siblings of `chunk` into `target`
    pub async fn merge_from_chunk(
        &self,
        chunk: &FileChunk,
        target: impl AsRef<Path>,
    ) -> Result<MergeSummary> {
        self.merge_from_chunk_path(&chunk.path, target).await
    }

    /// Merge every chunk sharing `any_chunk_path`'s original file into `target`.
    ///
    /// Chunks are appended from index 0 upward until the first missing index;
    /// a gap truncates the output silently. On failure the partially written
    /// target is left where it is.
    pub async fn merge_from_chunk_path(
        &self,
        any_chunk_path: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<MergeSummary> {
        let any_chunk_path = any_chunk_path.as_ref();
        let target = target.as_ref();

        let original = original_path_for(any_chunk_path)?;
        let chunks = self.chunk_paths_for_file(&original).await?;
        info!(
            "Merging {} chunks of {} into {}",
            chunks.len(),
            original.display(),
            target.display()
        );

        let mut out = tokio::fs::File::create(target)
            .await
            .with_context(|| format!("Failed to create merge target: {}", target.display()))?;

        let mut summary = MergeSummary::default();
        while let Some(chunk_path) = chunks.get(&summary.chunks_merged) {
            let content = tokio::fs::read(chunk_path)
                .await
                .with_context(|| format!("Failed to read chunk: {}", chunk_path.display()))?;
            out.write_all(&content)
                .await
                .with_context(|| format!("Failed to write to merge target: {}", target.display()))?;

            summary.chunks_merged += 1;
            summary.bytes_written += content.len() as u64;
        }

        out.flush()
            .await
            .with_context(|| format!("Failed to flush merge target: {}", target.display()))?;

        if summary.chunks_merged < chunks.len() {
            warn!(
                "Chunk {} of {} is missing, merged {} of {} chunks",
                summary.chunks_merged,
                original.display(),
                summary.chunks_merged,
                chunks.len()
            );
        }
        info!(
            "Merged {} chunks ({} bytes) into {}",
            summary.chunks_merged,
            summary.bytes_written,
            target.display()
        );

        Ok(summary)
    }
}
