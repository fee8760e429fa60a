//! Filesystem cache backend.
//!
//! One file per key under a root directory. File names are the SHA-256 of
//! the key so any legal key maps to a safe, fixed-length name; the key is
//! stored inside the record and checked on read.

use super::{CacheBackend, CacheEntry};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ENTRY_EXTENSION: &str = "cache";

/// Distinguishes backends opened on the same directory within one process.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Deserialize)]
struct FileRecord {
    key: String,
    expires_at_ms: Option<u64>,
    value: Vec<u8>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| duration_ms(d))
        .unwrap_or(0)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Durable backend writing each entry to its own file.
///
/// Writes go to a temporary file first and are renamed into place, so
/// readers never observe a partially written entry.
#[derive(Clone, Debug)]
pub struct FileBackend {
    root: Arc<PathBuf>,
    instance: u64,
    tmp_counter: Arc<AtomicU64>,
}

impl FileBackend {
    /// Open (creating if needed) a cache directory.
    ///
    /// # Errors
    /// Returns `Err` if the directory cannot be created.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::ConfigError(format!(
                "Failed to create cache directory {}: {}",
                root.display(),
                e
            ))
        })?;

        info!("✓ File backend initialized at {}", root.display());

        Ok(FileBackend {
            root: Arc::new(root),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            tmp_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    /// Scratch path for one write. The pid and instance id keep writers
    /// sharing `root` apart.
    fn tmp_path(&self, entry: &Path) -> PathBuf {
        entry.with_extension(format!(
            "{}-{}-{}.tmp",
            std::process::id(),
            self.instance,
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ))
    }

    async fn read_record(&self, key: &str) -> Result<Option<FileRecord>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match postcard::from_bytes::<FileRecord>(&bytes) {
            Ok(record) if record.key == key => Ok(Some(record)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("⚠ File cache entry {} is corrupted ({}), removing", key, e);
                self.remove_path(&path).await?;
                Ok(None)
            }
        }
    }

    async fn remove_path(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(record) = self.read_record(key).await? else {
            debug!("✓ File GET {} -> MISS", key);
            return Ok(None);
        };

        let ttl = match record.expires_at_ms {
            None => None,
            Some(at) => {
                let now = now_ms();
                if at <= now {
                    self.remove_path(&self.entry_path(key)).await?;
                    debug!("✓ File GET {} -> EXPIRED", key);
                    return Ok(None);
                }
                Some(Duration::from_millis(at - now))
            }
        };

        debug!("✓ File GET {} -> HIT", key);
        Ok(Some(CacheEntry::new(record.value, ttl)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let record = FileRecord {
            key: key.to_string(),
            // A deadline past the u64 range is stored as no expiry.
            expires_at_ms: ttl.and_then(|d| now_ms().checked_add(duration_ms(d))),
            value,
        };
        let bytes = postcard::to_allocvec(&record)
            .map_err(|e| Error::SerializationError(e.to_string()))?;

        let path = self.entry_path(key);
        let tmp = self.tmp_path(&path);
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("✓ File SET {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove_path(&self.entry_path(key)).await?;
        debug!("✓ File DELETE {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tokio::fs::metadata(self.root.as_path())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(self.root.as_path()).await?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                self.remove_path(&path).await?;
                removed += 1;
            }
        }

        warn!(
            "⚠ File cache cleared - {} entries removed from {}",
            removed,
            self.root.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (tempfile::TempDir, FileBackend) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let backend = FileBackend::new(dir.path())
            .await
            .expect("Failed to open file backend");
        (dir, backend)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (_dir, backend) = backend().await;

        backend
            .set("user:1", b"Alice".to_vec(), None)
            .await
            .expect("Failed to set");
        let entry = backend
            .get("user:1")
            .await
            .expect("Failed to get")
            .expect("Entry missing");
        assert_eq!(entry.value, b"Alice");
        assert_eq!(entry.ttl, None);

        backend.delete("user:1").await.expect("Failed to delete");
        assert!(backend.get("user:1").await.expect("Failed to get").is_none());
        assert!(backend.delete("user:1").await.is_ok());
    }

    #[tokio::test]
    async fn test_reports_remaining_ttl() {
        let (_dir, backend) = backend().await;
        backend
            .set("k", vec![1, 2, 3], Some(Duration::from_secs(60)))
            .await
            .expect("Failed to set");

        let ttl = backend
            .get("k")
            .await
            .expect("Failed to get")
            .expect("Entry missing")
            .ttl
            .expect("TTL missing");
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let (_dir, backend) = backend().await;
        backend
            .set("k", vec![1], Some(Duration::ZERO))
            .await
            .expect("Failed to set");

        assert!(backend.get("k").await.expect("Failed to get").is_none());
        assert!(!backend.entry_path("k").exists());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let (dir, backend) = backend().await;
        backend
            .set("k", b"durable".to_vec(), None)
            .await
            .expect("Failed to set");
        drop(backend);

        let reopened = FileBackend::new(dir.path())
            .await
            .expect("Failed to reopen");
        assert!(reopened.exists("k").await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_corrupted_entry_reads_as_miss() {
        let (_dir, backend) = backend().await;
        tokio::fs::write(backend.entry_path("k"), b"\xff\xff\xff")
            .await
            .expect("Failed to write garbage");

        assert!(backend.get("k").await.expect("Failed to get").is_none());
    }

    #[tokio::test]
    async fn test_clear_all_only_removes_entries() {
        let (dir, backend) = backend().await;
        backend.set("a", vec![1], None).await.expect("Failed to set");
        backend.set("b", vec![2], None).await.expect("Failed to set");
        let unrelated = dir.path().join("notes.txt");
        tokio::fs::write(&unrelated, b"keep me")
            .await
            .expect("Failed to write");

        backend.clear_all().await.expect("Failed to clear");

        assert!(!backend.exists("a").await.expect("Failed to check"));
        assert!(!backend.exists("b").await.expect("Failed to check"));
        assert!(unrelated.exists());
        assert!(backend.health_check().await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_unbounded_ttl_never_expires() {
        let (_dir, backend) = backend().await;
        backend
            .set("k", vec![9], Some(Duration::MAX))
            .await
            .expect("Failed to set");

        let entry = backend
            .get("k")
            .await
            .expect("Failed to get")
            .expect("Entry missing");
        assert_eq!(entry.value, vec![9]);
        assert_eq!(entry.ttl, None);
    }

    #[tokio::test]
    async fn test_backends_sharing_a_directory_use_distinct_tmp_paths() {
        let (dir, first) = backend().await;
        let second = FileBackend::new(dir.path())
            .await
            .expect("Failed to open second backend");

        let entry = first.entry_path("k");
        assert_eq!(entry, second.entry_path("k"));
        assert_ne!(first.tmp_path(&entry), second.tmp_path(&entry));
        assert_ne!(first.tmp_path(&entry), first.tmp_path(&entry));

        first.set("k", vec![1], None).await.expect("Failed to set");
        second.set("k", vec![2], None).await.expect("Failed to set");
        let value = first
            .get("k")
            .await
            .expect("Failed to get")
            .expect("Entry missing")
            .value;
        assert_eq!(value, vec![2]);
    }
}
