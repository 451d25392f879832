//! One async lock per fingerprint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use piggybook_core::fingerprint::RequestFingerprint;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<RequestFingerprint, Arc<AsyncMutex<()>>>;

/// Serializes work per key while letting different keys run in parallel.
///
/// An entry lives only while someone holds or waits for its lock.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<LockMap>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &RequestFingerprint) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

/// Holds one key's lock; releasing the last interest removes the entry.
#[derive(Debug)]
pub(crate) struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: RequestFingerprint,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // New interest is only taken under the map lock, so the count is
        // stable while it is held.
        let mut locks = self.locks.map();
        drop(self.guard.take());
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_same_key_waits_for_the_holder() {
        // Arrange
        let locks = KeyedLocks::default();
        let key = RequestFingerprint::new(7, "Saving");
        let held = locks.lock(&key).await;

        // Act
        let second = tokio::time::timeout(Duration::from_millis(10), locks.lock(&key)).await;
        drop(held);
        let third = tokio::time::timeout(Duration::from_millis(10), locks.lock(&key)).await;

        // Assert
        assert!(second.is_err());
        assert!(third.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::default();
        let _saving = locks.lock(&RequestFingerprint::new(7, "Saving")).await;
        let sharing = tokio::time::timeout(
            Duration::from_millis(10),
            locks.lock(&RequestFingerprint::new(7, "Sharing")),
        )
        .await;
        assert!(sharing.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_is_removed_once_the_last_holder_releases() {
        // Arrange
        let locks = KeyedLocks::default();
        let key = RequestFingerprint::new(7, "Saving");
        let held = locks.lock(&key).await;

        // Act
        let (second, ()) = tokio::join!(locks.lock(&key), async {
            tokio::task::yield_now().await;
            drop(held);
        });
        let while_waiter_holds = locks.len();
        drop(second);

        // Assert
        assert_eq!(while_waiter_holds, 1);
        assert_eq!(locks.len(), 0);
    }
}
