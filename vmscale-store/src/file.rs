//! File-backed JSON timing store with an explicit session lifecycle

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use vmscale_interfaces::{StoreError, TimingStore};

struct FileStoreInner {
    entries: HashMap<String, Value>,
    dirty: bool,
    closed: bool,
}

/// File-backed timing store.
///
/// A session starts with [`FileTimingStore::open`], which loads any existing
/// content, and ends with [`FileTimingStore::close`], which flushes and
/// rejects further writes. Persistence is atomic: the store writes a sibling
/// temp file and renames it over the target. Dropping a store with
/// unflushed writes performs a last-resort synchronous flush; explicit
/// `close()` is the supported path.
pub struct FileTimingStore {
    path: PathBuf,
    inner: Arc<RwLock<FileStoreInner>>,
}

impl FileTimingStore {
    /// Open a store session backed by `path`, loading existing content.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(Self {
            path,
            inner: Arc::new(RwLock::new(FileStoreInner {
                entries,
                dirty: false,
                closed: false,
            })),
        })
    }

    /// Flush pending writes and end the session. Later writes fail with
    /// [`StoreError::Closed`].
    pub async fn close(&self) -> Result<(), StoreError> {
        self.flush().await?;
        self.inner.write().closed = true;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "timings".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TimingStore for FileTimingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.entries.insert(key.to_string(), value);
        inner.dirty = true;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let previous = inner.entries.remove(key);
        if previous.is_some() {
            inner.dirty = true;
        }
        Ok(previous)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let payload = {
            let mut inner = self.inner.write();
            if !inner.dirty {
                return Ok(());
            }
            let bytes = serde_json::to_vec_pretty(&inner.entries)?;
            inner.dirty = false;
            bytes
        };

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let temp = self.temp_path();
        let result = async {
            tokio::fs::write(&temp, &payload).await?;
            tokio::fs::rename(&temp, &self.path).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(err) = result {
            // Keep the data marked unflushed so a retry or drop can persist it.
            self.inner.write().dirty = true;
            return Err(StoreError::Io(err));
        }

        Ok(())
    }
}

impl Drop for FileTimingStore {
    fn drop(&mut self) {
        let inner = self.inner.read();
        if !inner.dirty {
            return;
        }
        match serde_json::to_vec_pretty(&inner.entries) {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&self.path, bytes) {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "failed to flush timing store on drop"
                    );
                }
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to serialize timing store on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");

        let store = FileTimingStore::open(&path).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);

        // Nothing written yet, so flush leaves no file behind
        store.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");

        let store = FileTimingStore::open(&path).await.unwrap();
        store.set("run-deploy-start", json!(10.0)).await.unwrap();
        store.set("run-deploy-stop", json!(25.5)).await.unwrap();
        store.close().await.unwrap();

        let reopened = FileTimingStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("run-deploy-stop").await.unwrap(),
            Some(json!(25.5))
        );
        // No temp file left after an atomic flush
        assert!(!reopened.temp_path().exists());
    }

    #[tokio::test]
    async fn test_writes_rejected_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");

        let store = FileTimingStore::open(&path).await.unwrap();
        store.set("key", json!(1)).await.unwrap();
        store.close().await.unwrap();

        let result = store.set("key", json!(2)).await;
        assert!(matches!(result, Err(StoreError::Closed)));
        let result = store.remove("key").await;
        assert!(matches!(result, Err(StoreError::Closed)));

        // Reads still work on a closed session
        assert_eq!(store.get("key").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_drop_flushes_unflushed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");

        {
            let store = FileTimingStore::open(&path).await.unwrap();
            store.set("run-delete-elapsed", json!(3.25)).await.unwrap();
            // Dropped without close or flush
        }

        let reopened = FileTimingStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("run-delete-elapsed").await.unwrap(),
            Some(json!(3.25))
        );
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");

        let store = FileTimingStore::open(&path).await.unwrap();
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();
        store.flush().await.unwrap();

        assert_eq!(store.remove("a").await.unwrap(), Some(json!(1)));
        store.flush().await.unwrap();

        let reopened = FileTimingStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a").await.unwrap(), None);
        assert_eq!(reopened.get("b").await.unwrap(), Some(json!(2)));
    }
}
