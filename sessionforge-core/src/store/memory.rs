//! In-memory cache backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CacheBackend, CacheEntry, StoreError};
use crate::model::ItemScope;

/// In-memory cache backend.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// Entries are replaced whole under a `RwLock`, so concurrent readers see
/// either the previous or the new entry.
pub struct MemoryStore {
    data: RwLock<HashMap<(ItemScope, String), CacheEntry>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.data.read().len())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryStore {
    async fn load(&self, scope: &ItemScope, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let data = self.data.read();
        Ok(data.get(&(scope.clone(), key.to_string())).cloned())
    }

    async fn save(&self, scope: &ItemScope, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let mut data = self.data.write();
        data.insert((scope.clone(), key.to_string()), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;
    use chrono::Utc;

    fn entry(value: &str) -> CacheEntry {
        CacheEntry {
            value: Secret::new(value),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_save_load() {
        let store = MemoryStore::new();
        let scope = ItemScope::new("item");

        store.save(&scope, "sts", &entry("v1")).await.unwrap();
        let loaded = store.load(&scope, "sts").await.unwrap();

        assert_eq!(loaded.unwrap().value.expose(), "v1");
    }

    #[tokio::test]
    async fn test_memory_store_load_nonexistent() {
        let store = MemoryStore::new();
        let result = store.load(&ItemScope::new("item"), "missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_keys_are_scoped() {
        let store = MemoryStore::new();

        store.save(&ItemScope::new("a"), "sts", &entry("a")).await.unwrap();
        store.save(&ItemScope::new("b"), "sts", &entry("b")).await.unwrap();

        assert_eq!(store.data.read().len(), 2);
        let a = store.load(&ItemScope::new("a"), "sts").await.unwrap().unwrap();
        assert_eq!(a.value.expose(), "a");
    }
}
