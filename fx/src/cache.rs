//! Persistent cache for the last fetched rates document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

// Distinguishes concurrent writers within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Storage for the raw text of the last fetched document.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Where the cache lives, for diagnostics.
    fn location(&self) -> &Path;

    /// Read the cached document, `None` if nothing has been cached yet.
    async fn read(&self) -> FxResult<Option<String>>;

    /// Replace the cached document.
    async fn write(&self, document: &str) -> FxResult<()>;
}

/// Document cache backed by a single file.
///
/// Writes go to a sibling temporary file that is renamed over the target, so
/// a failed write leaves the previous cache file intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Create a cache at `path`. Nothing is touched until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> FxError {
        FxError::CacheIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DocumentCache for FileCache {
    fn location(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> FxResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => {
                debug!(path = %self.path.display(), bytes = text.len(), "Read cache file");
                Ok(Some(text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache file");
                Ok(None)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write(&self, document: &str) -> FxResult<()> {
        let temp = self.temp_path();

        if let Err(e) = fs::write(&temp, document).await {
            let _ = fs::remove_file(&temp).await;
            warn!(path = %temp.display(), error = %e, "Failed to write cache file");
            return Err(self.io_error(e));
        }

        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            warn!(path = %self.path.display(), error = %e, "Failed to replace cache file");
            return Err(self.io_error(e));
        }

        debug!(path = %self.path.display(), bytes = document.len(), "Wrote cache file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("rates.json"));

        assert!(cache.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("rates.json"));

        cache.write(r#"{"timestamp":1,"rates":{}}"#).await.unwrap();
        assert_eq!(
            cache.read().await.unwrap().as_deref(),
            Some(r#"{"timestamp":1,"rates":{}}"#)
        );

        cache.write("second").await.unwrap();
        assert_eq!(cache.read().await.unwrap().as_deref(), Some("second"));

        // Only the cache file remains, no temporary leftovers
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let cache = FileCache::new(&path);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        cache.write(&format!("writer-{}", i)).await?;
                    }
                    Ok::<_, FxError>(())
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let text = FileCache::new(&path).read().await.unwrap().unwrap();
        assert!(text.starts_with("writer-"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("missing").join("rates.json"));

        let err = cache.write("new").await.unwrap_err();

        assert!(matches!(err, FxError::CacheIo { .. }));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        let cache = FileCache::new(dir.path());

        let err = cache.read().await.unwrap_err();
        assert!(err.is_data_acquisition());
    }
}
