use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Literal tag embedded in every chunk file name: `<original>.<marker>.<index>`
pub const CHUNK_MARKER: &str = "go-stress-chunk";

/// Default maximum chunk size in bytes (10 KiB)
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 10 * 1024;

/// Configuration for file cutting operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CutConfig {
    /// Maximum chunk size in bytes
    pub max_chunk_size: u64,
    /// Whether every chunk is mirrored to its own file next to the original
    pub fall_disk: bool,
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            fall_disk: false,
        }
    }
}

impl CutConfig {
    /// Build a config from a chunk size in kilobytes, never below one byte
    pub fn from_kb(chunk_size_kb: f64) -> Self {
        let bytes = (chunk_size_kb * 1024.0) as u64;
        Self {
            max_chunk_size: bytes.max(1),
            ..Default::default()
        }
    }

    pub fn with_fall_disk(mut self, fall_disk: bool) -> Self {
        self.fall_disk = fall_disk;
        self
    }
}

/// One sequentially-read slice of a source file
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileChunk {
    /// Base file name of the chunk
    pub name: String,
    /// Full chunk path, `<original>.<marker>.<offset>`
    pub path: PathBuf,
    /// Source file the chunk was cut from
    pub original_file_name: PathBuf,
    /// Number of content bytes
    #[serde(rename = "total")]
    pub size: u64,
    #[serde(skip)]
    pub content: Bytes,
    pub is_fall_disk: bool,
    /// Sequential chunk index, not a byte position
    pub offset: usize,
    /// Set when reading or persisting this chunk failed
    #[serde(rename = "err", serialize_with = "serialize_error")]
    pub error: Option<Arc<io::Error>>,
}

impl FileChunk {
    pub fn new(
        original_file_name: &Path,
        offset: usize,
        content: Bytes,
        is_fall_disk: bool,
    ) -> Self {
        let path = chunk_path_for(original_file_name, offset);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            path,
            original_file_name: original_file_name.to_path_buf(),
            size: content.len() as u64,
            content,
            is_fall_disk,
            offset,
            error: None,
        }
    }

    /// Chunk carrying only an error; every other field is zero-valued
    pub fn error_only(err: io::Error) -> Self {
        Self {
            error: Some(Arc::new(err)),
            ..Default::default()
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Turn an error chunk into an `Err`, passing healthy chunks through
    pub fn into_result(self) -> Result<Self> {
        match &self.error {
            Some(err) if self.path.as_os_str().is_empty() => {
                Err(anyhow!("{}", err).context("Failed to read chunk from source file"))
            }
            Some(err) => {
                let context = format!("Chunk {} failed", self.path.display());
                Err(anyhow!("{}", err).context(context))
            }
            None => Ok(self),
        }
    }

    /// Persist the chunk content to `path` when fall-disk is enabled.
    ///
    /// Failures are recorded on `error` rather than returned; the in-memory
    /// content stays intact either way.
    pub async fn fall_disk(&mut self) {
        if !self.is_fall_disk {
            return;
        }

        if let Err(err) = write_chunk_file(&self.path, &self.content).await {
            self.error = Some(Arc::new(err));
        }
    }
}

async fn write_chunk_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await
}

impl fmt::Display for FileChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[chunkname]: {}, [size]: {}", self.name, self.size)
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<Arc<io::Error>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Chunk path for the given original file and chunk index
pub fn chunk_path_for(original: &Path, offset: usize) -> PathBuf {
    let mut path = OsString::from(original.as_os_str());
    path.push(format!(".{}.{}", CHUNK_MARKER, offset));
    PathBuf::from(path)
}

/// File-name prefix shared by every chunk of `original_name`, as encoded bytes
/// so names that are not valid UTF-8 still match
pub fn chunk_name_prefix(original_name: &OsStr) -> Vec<u8> {
    let mut prefix = original_name.as_encoded_bytes().to_vec();
    prefix.extend_from_slice(format!(".{}.", CHUNK_MARKER).as_bytes());
    prefix
}

/// Index part of `file_name` if it starts with `prefix`, parsed as a chunk
/// index. `None` means the name belongs to another file; `Some(None)` means a
/// chunk name whose index is malformed.
pub fn chunk_index_in(file_name: &OsStr, prefix: &[u8]) -> Option<Option<usize>> {
    let suffix = file_name.as_encoded_bytes().strip_prefix(prefix)?;
    Some(parse_index(suffix))
}

fn parse_index(bytes: &[u8]) -> Option<usize> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(bytes).to_os_string())
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: &[u8]) -> Option<OsString> {
    std::str::from_utf8(bytes).ok().map(OsString::from)
}

/// Recover the original file path from any chunk path by dropping the
/// trailing `.<marker>.<index>` suffix
pub fn original_path_for(chunk_path: &Path) -> Result<PathBuf> {
    let not_a_chunk = || {
        anyhow!(
            "Not a chunk path (expected <file>.{}.<index>): {}",
            CHUNK_MARKER,
            chunk_path.display()
        )
    };

    let file_name = chunk_path
        .file_name()
        .with_context(|| format!("Chunk path has no file name: {}", chunk_path.display()))?
        .as_encoded_bytes();

    let index_dot = file_name.iter().rposition(|&b| b == b'.').ok_or_else(not_a_chunk)?;
    parse_index(&file_name[index_dot + 1..]).ok_or_else(not_a_chunk)?;

    let marker = format!(".{}.", CHUNK_MARKER);
    let original_name = file_name[..=index_dot]
        .strip_suffix(marker.as_bytes())
        .filter(|name| !name.is_empty())
        .and_then(os_string_from_bytes)
        .ok_or_else(not_a_chunk)?;

    Ok(chunk_path.with_file_name(original_name))
}
