//! Per-request generation state machine.
//!
//! `Idle → CheckingCache → Done(Cache)` on a hit, and
//! `CheckingCache → Generating → Done(Generated) | Failed` on a miss.

use serde::Serialize;
use thiserror::Error;

/// Where a returned story came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorySource {
    /// Served without calling the story provider.
    Cache,
    /// Produced by the story provider for this request.
    Generated,
}

/// Phase of one story request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    /// Not started.
    #[default]
    Idle,
    /// Looking the fingerprint up.
    CheckingCache,
    /// Waiting on the story provider (retries included).
    Generating,
    /// A story is available.
    Done(StorySource),
    /// Generation failed; nothing was cached.
    Failed,
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal generation transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// Phase before the attempted transition.
    pub from: GenerationPhase,
    /// Rejected target phase.
    pub to: GenerationPhase,
}

impl GenerationPhase {
    /// Returns `next` if the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTransition` for any edge outside the state machine.
    pub fn advance(self, next: Self) -> Result<Self, IllegalTransition> {
        let allowed = matches!(
            (self, next),
            (Self::Idle, Self::CheckingCache)
                | (
                    Self::CheckingCache,
                    Self::Done(StorySource::Cache) | Self::Generating
                )
                | (
                    Self::Generating,
                    Self::Done(StorySource::Generated) | Self::Failed
                )
        );
        if allowed {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the request has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed)
    }
}
