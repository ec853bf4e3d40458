//! Demo binary: cut a file to disk, then merge it back

use anyhow::{bail, Context, Result};
use chunkfile::{cut_file, CutConfig, CHUNK_MERGER};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Chunkfile v{}", chunkfile::VERSION);

    let mut args = std::env::args().skip(1);
    let Some(source) = args.next().map(PathBuf::from) else {
        bail!("usage: chunkfile <file> [max_chunk_bytes] [target]");
    };
    let max_chunk_size = match args.next() {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("Invalid chunk size: {}", raw))?,
        None => CutConfig::default().max_chunk_size,
    };
    let target = args.next().map(PathBuf::from).unwrap_or_else(|| {
        let mut merged = source.clone().into_os_string();
        merged.push(".merged");
        PathBuf::from(merged)
    });

    let mut chunks = cut_file(&source, max_chunk_size, true).await?;
    let mut first_chunk = None;
    while let Some(chunk) = chunks.recv().await {
        if let Some(err) = &chunk.error {
            error!("Chunk {} failed: {}", chunk.offset, err);
            bail!("Cutting {} failed", source.display());
        }
        info!("{}", chunk);
        first_chunk.get_or_insert(chunk);
    }

    let Some(first_chunk) = first_chunk else {
        info!("{} is empty, nothing to merge", source.display());
        return Ok(());
    };

    let summary = CHUNK_MERGER.merge_from_chunk(&first_chunk, &target).await?;
    info!(
        "Rebuilt {} from {} chunks ({} bytes)",
        target.display(),
        summary.chunks_merged,
        summary.bytes_written
    );
    Ok(())
}
