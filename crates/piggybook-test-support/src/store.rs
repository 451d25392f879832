//! Test stores: `CacheStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use piggybook_core::error::StorageError;
use piggybook_core::store::CacheStore;

/// An in-memory store that records every write. Reads return the most
/// recent value written for a key.
#[derive(Debug, Default)]
pub struct RecordingStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    reads: Mutex<Vec<String>>,
}

impl RecordingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `value` under `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_entry(key: &str, value: Vec<u8>) -> Self {
        let store = Self::new();
        store.values.lock().unwrap().insert(key.to_owned(), value);
        store
    }

    /// Every `(key, value)` written, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    /// Every key read, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    /// The latest value written under `key`, decoded as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the value is not valid JSON or the mutex is poisoned.
    pub fn json(&self, key: &str) -> Option<serde_json::Value> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|bytes| serde_json::from_slice(bytes).expect("stored value is not JSON"))
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.reads.lock().unwrap().push(key.to_owned());
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_owned(), value.to_vec()));
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

/// A store whose reads and/or writes always fail with an infrastructure
/// error. Useful for testing fail-open paths.
#[derive(Debug, Clone, Copy)]
pub struct FailingStore {
    /// Whether `read` fails. When false, reads report a miss.
    pub fail_reads: bool,
    /// Whether `write` fails. When false, writes are discarded.
    pub fail_writes: bool,
}

impl FailingStore {
    /// Both reads and writes fail.
    #[must_use]
    pub fn broken() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
        }
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_reads {
            Err(StorageError::Database("connection refused".into()))
        } else {
            Ok(None)
        }
    }

    async fn write(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            Err(StorageError::Database("connection refused".into()))
        } else {
            Ok(())
        }
    }
}
