//! Errors for the Story Generation context.

use piggybook_core::error::{DocumentError, ProviderError};
use piggybook_core::fingerprint::RequestFingerprint;
use thiserror::Error;

/// Text shown to the reader when a story cannot be produced.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Oops! Piggy is having a little trouble thinking. Let's try again later!";

/// Text shown to the reader when the request itself is unusable.
pub const INVALID_REQUEST_MESSAGE: &str =
    "Piggy didn't understand that request. Please check it and try again!";

/// Failure of one generation request. Nothing is cached when one is
/// returned.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request itself is unusable.
    #[error("invalid story request: {0}")]
    InvalidRequest(String),

    /// The story provider failed (after retries, if rate limited).
    #[error("story generation failed: {0}")]
    Failed(#[source] ProviderError),

    /// The provider returned a document that breaks its invariants.
    #[error("provider returned an invalid story: {0}")]
    InvalidDocument(#[source] DocumentError),

    /// No story is known under the fingerprint.
    #[error("no story stored under {0}")]
    NotFound(RequestFingerprint),

    /// The story has no such page.
    #[error("story {fingerprint} has no page {page_number}")]
    PageNotFound {
        /// The story that was looked up.
        fingerprint: RequestFingerprint,
        /// The missing page number.
        page_number: u32,
    },

    /// The image provider failed (after retries, if rate limited).
    #[error("image generation failed: {0}")]
    ImageFailed(#[source] ProviderError),
}

impl GenerationError {
    /// The single reader-facing message for a failed story request.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "We couldn't find that story.",
            Self::PageNotFound { .. } => "That page isn't in this story.",
            Self::InvalidRequest(_) => INVALID_REQUEST_MESSAGE,
            Self::Failed(_)
            | Self::InvalidDocument(_)
            | Self::ImageFailed(_) => GENERATION_FAILED_MESSAGE,
        }
    }
}
