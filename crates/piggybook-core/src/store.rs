//! Cache backing store abstraction.

use async_trait::async_trait;

use crate::error::StorageError;

/// Byte-oriented key-value store behind the content cache.
///
/// Reads and writes fail independently; the content cache decides how each
/// failure degrades.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the bytes stored under `key`, or `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}
