//! Durable key/value store for captured run timings.

use async_trait::async_trait;
use serde_json::Value;

/// Errors from the timing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store session was closed; no further writes are accepted.
    #[error("store is closed")]
    Closed,
}

/// Flat key/value store holding timing data across runs.
///
/// Keys follow the `{run_key}-{phase}-{field}` layout produced by the
/// capture helpers; values are plain JSON scalars. One process owns a store
/// at a time.
#[async_trait]
pub trait TimingStore: Send + Sync {
    /// Read a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a key, returning the previous value if any.
    async fn remove(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Persist pending writes. In-memory stores treat this as a no-op.
    async fn flush(&self) -> Result<(), StoreError>;
}

/// Numeric convenience reads over any [`TimingStore`].
#[async_trait]
pub trait TimingStoreExt: TimingStore {
    /// Read a key as `f64`; `None` when the key is absent or not numeric.
    async fn get_f64(&self, key: &str) -> Result<Option<f64>, StoreError> {
        Ok(self.get(key).await?.and_then(|value| value.as_f64()))
    }
}

#[async_trait]
impl<S: TimingStore + ?Sized> TimingStoreExt for S {}
