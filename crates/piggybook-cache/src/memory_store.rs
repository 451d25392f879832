//! In-process `CacheStore`.

use std::collections::HashMap;

use async_trait::async_trait;
use piggybook_core::error::StorageError;
use piggybook_core::store::CacheStore;
use tokio::sync::RwLock;

/// A store that lives as long as the process. Concurrent reads proceed in
/// parallel; writes are last-write-wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
