//! Directory-backed `CacheStore` for best-effort local persistence.
//!
//! Each key is one `<key>.json` file. Writes go to a temporary file first and
//! are renamed into place, so a reader never observes a half-written entry.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use piggybook_core::error::StorageError;
use piggybook_core::store::CacheStore;
use tokio::fs;
use uuid::Uuid;

/// A store that keeps one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory entries are kept in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let safe = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !safe {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cache key {key:?} is not a safe file name"),
            )));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;

        let staging = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        fs::write(&staging, value).await?;
        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.read("story-v2-abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_survive_a_new_store_instance() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        FileStore::new(&root)
            .write("story-v2-abc", b"{\"ok\":true}")
            .await
            .unwrap();

        // Act
        let reopened = FileStore::new(&root);
        let bytes = reopened.read("story-v2-abc").await.unwrap();

        // Assert
        assert_eq!(bytes, Some(b"{\"ok\":true}".to_vec()));
    }

    #[tokio::test]
    async fn test_write_replaces_previous_value_without_leftovers() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        // Act
        store.write("story-v2-abc", b"one").await.unwrap();
        store.write("story-v2-abc", b"two").await.unwrap();

        // Assert
        assert_eq!(store.read("story-v2-abc").await.unwrap(), Some(b"two".to_vec()));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("story-v2-abc.json")]);
    }

    #[tokio::test]
    async fn test_unsafe_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.write("../escape", b"x").await.is_err());
        assert!(store.read("a/b").await.is_err());
    }
}
