//! Simple in-memory timing store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use vmscale_interfaces::{StoreError, TimingStore};

/// Simple in-memory timing store
pub struct MemoryTimingStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryTimingStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Full copy of the current contents, for assertions and debugging.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.read().clone()
    }
}

impl Default for MemoryTimingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimingStore for MemoryTimingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.write().remove(key))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vmscale_interfaces::TimingStoreExt;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryTimingStore::new();

        store.set("run-deploy-start", json!(100.5)).await.unwrap();
        let value = store.get("run-deploy-start").await.unwrap();
        assert_eq!(value, Some(json!(100.5)));

        let missing = store.get("run-deploy-stop").await.unwrap();
        assert_eq!(missing, None);

        let removed = store.remove("run-deploy-start").await.unwrap();
        assert_eq!(removed, Some(json!(100.5)));
        assert_eq!(store.get("run-deploy-start").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_f64_helper() {
        let store = MemoryTimingStore::new();
        store.set("elapsed", json!(12.25)).await.unwrap();
        store.set("label", json!("not a number")).await.unwrap();

        assert_eq!(store.get_f64("elapsed").await.unwrap(), Some(12.25));
        assert_eq!(store.get_f64("label").await.unwrap(), None);
        assert_eq!(store.get_f64("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let store = MemoryTimingStore::new();
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"], json!(1));
    }
}
