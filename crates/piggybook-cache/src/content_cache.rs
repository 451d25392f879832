//! The content cache: fingerprint → story document.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use piggybook_core::clock::Clock;
use piggybook_core::fingerprint::RequestFingerprint;
use piggybook_core::store::CacheStore;
use piggybook_core::story::StoryDocument;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persisted envelope around a cached document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedStory {
    /// Key the entry was stored under.
    pub fingerprint: RequestFingerprint,
    /// When the entry was last written.
    pub stored_at: DateTime<Utc>,
    /// The whole document.
    pub document: StoryDocument,
}

/// Cache-first lookup and write-through store for generated stories.
///
/// Lookups and stores always move whole documents; there is no eviction.
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl ContentCache {
    /// Creates a cache over `store`, stamping entries with `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the cached document for `fingerprint`.
    ///
    /// Store errors, undecodable bytes and entries written under a different
    /// fingerprint are logged and reported as a miss.
    pub async fn get(&self, fingerprint: &RequestFingerprint) -> Option<StoryDocument> {
        self.entry(fingerprint).await.map(|entry| entry.document)
    }

    /// Like [`ContentCache::get`] but returns the whole envelope.
    pub async fn entry(&self, fingerprint: &RequestFingerprint) -> Option<CachedStory> {
        let bytes = match self.store.read(fingerprint.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(%fingerprint, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(%fingerprint, error = %err, "cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<CachedStory>(&bytes) {
            Ok(entry) if entry.fingerprint == *fingerprint => {
                debug!(%fingerprint, stored_at = %entry.stored_at, "cache hit");
                Some(entry)
            }
            Ok(entry) => {
                warn!(
                    %fingerprint,
                    found = %entry.fingerprint,
                    "cache entry stored under the wrong key; treating as miss"
                );
                None
            }
            Err(err) => {
                warn!(%fingerprint, error = %err, "cache entry undecodable; treating as miss");
                None
            }
        }
    }

    /// Stores `document` under `fingerprint`, overwriting any previous entry.
    ///
    /// Returns whether the write reached the store. A failed write is logged
    /// and otherwise ignored.
    pub async fn set(&self, fingerprint: &RequestFingerprint, document: &StoryDocument) -> bool {
        let entry = CachedStory {
            fingerprint: fingerprint.clone(),
            stored_at: self.clock.now(),
            document: document.clone(),
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%fingerprint, error = %err, "cache entry could not be encoded");
                return false;
            }
        };

        match self.store.write(fingerprint.as_str(), &bytes).await {
            Ok(()) => {
                debug!(%fingerprint, bytes = bytes.len(), "cache write");
                true
            }
            Err(err) => {
                warn!(%fingerprint, error = %err, "cache write failed; continuing without persistence");
                false
            }
        }
    }
}
