//! Shared, mutable view of one open story.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use piggybook_core::fingerprint::RequestFingerprint;
use piggybook_core::story::{Page, StoryDocument};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// A story the orchestrator has handed out.
///
/// All image attachments to the document go through the document lock, so
/// concurrent fills for different pages never lose each other's updates.
#[derive(Debug)]
pub struct StoryHandle {
    fingerprint: RequestFingerprint,
    document: AsyncMutex<StoryDocument>,
    filling: Mutex<HashSet<u32>>,
}

impl StoryHandle {
    pub(crate) fn new(fingerprint: RequestFingerprint, document: StoryDocument) -> Self {
        Self {
            fingerprint,
            document: AsyncMutex::new(document),
            filling: Mutex::new(HashSet::new()),
        }
    }

    /// The key this story is cached under.
    #[must_use]
    pub fn fingerprint(&self) -> &RequestFingerprint {
        &self.fingerprint
    }

    /// A copy of the current document.
    pub async fn snapshot(&self) -> StoryDocument {
        self.document.lock().await.clone()
    }

    /// A copy of one page, if it exists.
    pub async fn page(&self, page_number: u32) -> Option<Page> {
        self.document.lock().await.page(page_number).cloned()
    }

    pub(crate) async fn lock_document(&self) -> MutexGuard<'_, StoryDocument> {
        self.document.lock().await
    }

    /// Marks `page_number` as being filled. Returns `None` if a fill for it
    /// is already running.
    pub(crate) fn begin_fill(&self, page_number: u32) -> Option<FillGuard<'_>> {
        let inserted = self
            .filling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page_number);
        inserted.then_some(FillGuard {
            story: self,
            page_number,
        })
    }
}

/// Clears the in-flight mark for a page when dropped.
#[derive(Debug)]
pub(crate) struct FillGuard<'a> {
    story: &'a StoryHandle,
    page_number: u32,
}

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        self.story
            .filling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.page_number);
    }
}
