//! Error types shared across crate boundaries.

use std::time::Duration;

use thiserror::Error;

use crate::retry::RateLimitAware;

/// Failure reported by a story, image or speech provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider refused the request because of rate limiting. This is
    /// the only variant the backoff executor retries.
    #[error("provider rate limited the request")]
    RateLimited {
        /// Server-suggested wait before the next attempt, if any.
        retry_after: Option<Duration>,
    },

    /// The request failed for any other reason (transport, auth, 5xx).
    #[error("provider request failed: {0}")]
    Failed(String),

    /// The provider answered but the payload could not be interpreted.
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl RateLimitAware for ProviderError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of a cache backing store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored bytes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// A story document violates one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The book has no pages.
    #[error("story has no pages")]
    NoPages,

    /// Page numbers must run 1..=n in order.
    #[error("page at position {position} has number {found}, expected {expected}")]
    PageOutOfOrder {
        /// Zero-based position in the page list.
        position: usize,
        /// The page number required at that position.
        expected: u32,
        /// The page number actually present.
        found: u32,
    },

    /// A knowledge check has no choices.
    #[error("knowledge check {index} has no choices")]
    NoChoices {
        /// Zero-based index of the knowledge check.
        index: usize,
    },

    /// Two choices of one knowledge check share a label.
    #[error("knowledge check {index} repeats choice id {choice_id:?}")]
    DuplicateChoice {
        /// Zero-based index of the knowledge check.
        index: usize,
        /// The repeated label.
        choice_id: String,
    },

    /// The correct answer does not name any choice.
    #[error("knowledge check {index} answer {answer:?} matches no choice")]
    UnknownAnswer {
        /// Zero-based index of the knowledge check.
        index: usize,
        /// The label that matched nothing.
        answer: String,
    },

    /// No page carries the requested number.
    #[error("page {0} does not exist")]
    PageNotFound(u32),
}
