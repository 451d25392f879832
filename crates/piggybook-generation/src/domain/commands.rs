//! Commands for the Story Generation context.

use piggybook_core::command::{Command, new_correlation_id};
use piggybook_core::fingerprint::RequestFingerprint;
use uuid::Uuid;

/// Command to produce (or fetch from cache) a story for a reader.
#[derive(Debug, Clone)]
pub struct GenerateStory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Reader age in years.
    pub age: u32,
    /// Concept the story should teach.
    pub concept: String,
}

impl GenerateStory {
    /// Creates the command with a fresh correlation ID.
    #[must_use]
    pub fn new(age: u32, concept: impl Into<String>) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            age,
            concept: concept.into(),
        }
    }

    /// The cache key of this request.
    #[must_use]
    pub fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint::new(self.age, &self.concept)
    }
}

impl Command for GenerateStory {
    fn command_type(&self) -> &'static str {
        "generation.generate_story"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to fill in the illustration of one page.
#[derive(Debug, Clone)]
pub struct FillPageImage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The story the page belongs to.
    pub fingerprint: RequestFingerprint,
    /// 1-based page number.
    pub page_number: u32,
}

impl FillPageImage {
    /// Creates the command with a fresh correlation ID.
    #[must_use]
    pub fn new(fingerprint: RequestFingerprint, page_number: u32) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            fingerprint,
            page_number,
        }
    }
}

impl Command for FillPageImage {
    fn command_type(&self) -> &'static str {
        "generation.fill_page_image"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
