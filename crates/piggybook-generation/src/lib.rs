//! Story Generation bounded context.
//!
//! Responsible for cache-first story creation, provider retries, and the
//! lazy, serialized attachment of page illustrations.

pub mod application;
pub mod domain;
pub mod error;

pub use application::orchestrator::{ImageFill, StoryOrchestrator, StoryOutcome};
pub use application::story_handle::StoryHandle;
pub use domain::phase::{GenerationPhase, StorySource};
pub use error::GenerationError;
