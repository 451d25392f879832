//! Provider ports: the generation and speech services the core drives.
//!
//! Every call is fallible and may be rate limited; callers wrap them in
//! [`crate::retry::execute`].

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::story::{AudioBytes, ImageRef, StoryDocument};

/// Generates a complete story document for a reader.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Produces a story about `concept` pitched at a reader of `age`.
    async fn generate_story(&self, age: u32, concept: &str)
    -> Result<StoryDocument, ProviderError>;
}

/// Generates page illustrations.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders an illustration for `prompt`. `Ok(None)` means the provider
    /// answered without an image.
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageRef>, ProviderError>;
}

/// Converts narration text to speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `text`. `Ok(None)` means the provider answered without
    /// audio.
    async fn synthesize(&self, text: &str) -> Result<Option<AudioBytes>, ProviderError>;
}
