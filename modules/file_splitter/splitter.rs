use super::types::*;
use anyhow::{bail, Context, Result};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

// One chunk in flight between producer and consumer
const CHUNK_CHANNEL_CAPACITY: usize = 1;

/// Cuts files into fixed-size chunks using a reusable configuration
pub struct FileSplitter {
    config: CutConfig,
}

impl FileSplitter {
    /// Create a new file splitter with default configuration
    pub fn new() -> Self {
        Self {
            config: CutConfig::default(),
        }
    }

    /// Create a new file splitter with custom configuration
    pub fn with_config(config: CutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CutConfig {
        &self.config
    }

    /// Start cutting `path` with this splitter's configuration
    pub async fn cut_file(&self, path: impl AsRef<Path>) -> Result<ChunkStream> {
        cut_file(path, self.config.max_chunk_size, self.config.fall_disk).await
    }
}

impl Default for FileSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `path` into chunks of at most `max_chunk_size` bytes.
///
/// Stat and open failures are returned before anything is produced. Once the
/// stream is returned, a background task reads the file sequentially and hands
/// chunks over one at a time in offset order. A mid-stream read failure shows up
/// as a single trailing chunk with `error` set.
pub async fn cut_file(
    path: impl AsRef<Path>,
    max_chunk_size: u64,
    fall_disk: bool,
) -> Result<ChunkStream> {
    let path = path.as_ref().to_path_buf();

    if max_chunk_size == 0 {
        bail!("Chunk size must be positive for {}", path.display());
    }

    let metadata = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("Failed to stat file: {}", path.display()))?;
    let file = File::open(&path)
        .await
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let total_size = metadata.len();
    info!(
        "Cutting {} ({} bytes) into chunks of at most {} bytes (fall disk: {})",
        path.display(),
        total_size,
        max_chunk_size,
        fall_disk
    );

    let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
    tokio::spawn(produce_chunks(file, path, total_size, max_chunk_size, fall_disk, tx));

    Ok(ChunkStream { rx })
}

async fn produce_chunks(
    mut file: File,
    path: PathBuf,
    total_size: u64,
    max_chunk_size: u64,
    fall_disk: bool,
    tx: mpsc::Sender<FileChunk>,
) {
    let mut remaining = total_size;
    let mut offset = 0usize;

    while remaining != 0 {
        let want = remaining.min(max_chunk_size) as usize;
        let content = match read_chunk(&mut file, want).await {
            Ok(content) => content,
            Err(err) => {
                error!("Read failed for {} at chunk {}: {}", path.display(), offset, err);
                // Receiver gone means nobody is left to report to
                let _ = tx.send(FileChunk::error_only(err)).await;
                break;
            }
        };

        let read = content.len() as u64;
        let mut chunk = FileChunk::new(&path, offset, content, fall_disk);
        chunk.fall_disk().await;
        if let Some(err) = &chunk.error {
            error!("Failed to persist chunk {}: {}", chunk.path.display(), err);
        } else {
            debug!("Produced {}", chunk);
        }

        if tx.send(chunk).await.is_err() {
            debug!("Chunk consumer for {} went away, stopping", path.display());
            break;
        }

        remaining -= read;
        offset += 1;
    }

    info!("Finished cutting {}: {} chunks", path.display(), offset);
    // `file` drops here, closing the source handle exactly once
}

/// Fill a fresh buffer with exactly `want` bytes, treating an early end of
/// file as an error
async fn read_chunk(file: &mut File, want: usize) -> io::Result<Bytes> {
    let mut buf = BytesMut::zeroed(want);
    let mut filled = 0;

    while filled < want {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended after {} of {} chunk bytes", filled, want),
            ));
        }
        filled += n;
    }

    Ok(buf.freeze())
}

/// Lazily produced sequence of chunks, in strictly increasing offset order
pub struct ChunkStream {
    rx: mpsc::Receiver<FileChunk>,
}

impl ChunkStream {
    /// Wait for the next chunk; `None` once the producer has finished
    pub async fn recv(&mut self) -> Option<FileChunk> {
        self.rx.recv().await
    }

    /// Drain every chunk, failing on the first one that carries an error
    pub async fn collect_chunks(mut self) -> Result<Vec<FileChunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.recv().await {
            chunks.push(chunk.into_result()?);
        }
        Ok(chunks)
    }
}

impl Stream for ChunkStream {
    type Item = FileChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_twenty_five_bytes_in_tens() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..25u8).collect();
        let path = write_file(&dir, "small.bin", &data);

        let chunks = cut_file(&path, 10, false).await.unwrap().collect_chunks().await.unwrap();

        let sizes: Vec<u64> = chunks.iter().map(|c| c.size).collect();
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(offsets, vec![0, 1, 2]);

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.content.iter().copied()).collect();
        assert_eq!(joined, data);

        // Nothing should be on disk without fall-disk
        assert!(chunks.iter().all(|c| !c.path.exists()));
    }

    #[tokio::test]
    async fn test_empty_file_produces_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.txt", b"");

        let mut stream = cut_file(&path, 4, true).await.unwrap();
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_streaming() {
        let dir = TempDir::new().unwrap();
        let result = cut_file(dir.path().join("nope.bin"), 10, false).await;

        let err = result.err().expect("missing file must fail");
        assert!(err.to_string().contains("Failed to stat file"));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"abc");
        assert!(cut_file(&path, 0, false).await.is_err());
    }

    #[tokio::test]
    async fn test_fall_disk_writes_each_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "disk.bin", b"hello chunked world");

        let chunks = cut_file(&path, 8, true).await.unwrap().collect_chunks().await.unwrap();
        assert_eq!(chunks.len(), 3);

        for chunk in &chunks {
            assert!(chunk.is_fall_disk);
            let on_disk = std::fs::read(&chunk.path).unwrap();
            assert_eq!(on_disk, chunk.content.as_ref());
        }
    }

    #[tokio::test]
    async fn test_fall_disk_failure_recorded_on_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "blocked.bin", b"0123456789");
        // A directory squatting on the chunk path makes the create fail
        std::fs::create_dir(chunk_path_for(&path, 0)).unwrap();

        let mut stream = cut_file(&path, 10, true).await.unwrap();
        let chunk = stream.recv().await.unwrap();
        assert!(chunk.is_err());
        assert_eq!(chunk.content.as_ref(), b"0123456789");
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_trait_yields_in_order() {
        let dir = TempDir::new().unwrap();
        let data = vec![7u8; 1000];
        let path = write_file(&dir, "ordered.bin", &data);

        let splitter = FileSplitter::with_config(CutConfig {
            max_chunk_size: 64,
            fall_disk: false,
        });
        let chunks: Vec<FileChunk> = splitter.cut_file(&path).await.unwrap().collect().await;

        assert_eq!(chunks.len(), 16);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.offset, i);
            assert!(!chunk.is_err());
        }
        assert_eq!(chunks.last().unwrap().size, 1000 - 15 * 64);
    }

    fn count_chunk_files(dir: &TempDir, original_name: &str) -> usize {
        let prefix = format!("{}.{}.", original_name, CHUNK_MARKER);
        std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .count()
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_producer() {
        let dir = TempDir::new().unwrap();
        // 4096 chunks if the producer were to run to the end
        let path = write_file(&dir, "dropped.bin", &vec![1u8; 64 * 1024]);

        let mut stream = cut_file(&path, 16, true).await.unwrap();
        let first = stream.recv().await.unwrap();
        assert_eq!(first.offset, 0);
        drop(stream);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let written = count_chunk_files(&dir, "dropped.bin");
        assert!(written <= 4, "producer kept going after drop: {} chunk files", written);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count_chunk_files(&dir, "dropped.bin"), written);
    }

    #[tokio::test]
    async fn test_read_error_ends_with_single_error_chunk() {
        let dir = TempDir::new().unwrap();
        // Directories stat and open fine but fail on read; the entry keeps the
        // reported length non-zero on every filesystem
        write_file(&dir, "entry.txt", b"x");
        assert!(std::fs::metadata(dir.path()).unwrap().len() > 0);

        let mut stream = cut_file(dir.path(), 10, false).await.unwrap();
        let chunk = stream.recv().await.unwrap();
        assert!(chunk.is_err());
        assert_eq!(chunk.offset, 0);
        assert_eq!(chunk.size, 0);
        assert!(chunk.content.is_empty());
        assert!(chunk.path.as_os_str().is_empty());
        assert!(chunk.name.is_empty());

        assert!(stream.recv().await.is_none());
    }
}
