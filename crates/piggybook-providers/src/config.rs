//! Gemini connection settings.

use std::fmt;
use std::time::Duration;

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection and model settings shared by the Gemini adapters.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`.
    pub api_key: String,
    /// Base URL up to and excluding `/models`.
    pub base_url: String,
    /// Model for story documents.
    pub story_model: String,
    /// Model for page illustrations.
    pub image_model: String,
    /// Model for narration audio.
    pub speech_model: String,
    /// Prebuilt narration voice.
    pub voice: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Default models against the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            story_model: "gemini-3-flash-preview".to_owned(),
            image_model: "gemini-2.5-flash-image".to_owned(),
            speech_model: "gemini-2.5-flash-preview-tts".to_owned(),
            voice: "Kore".to_owned(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Points the adapters at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("story_model", &self.story_model)
            .field("image_model", &self.image_model)
            .field("speech_model", &self.speech_model)
            .field("voice", &self.voice)
            .field("timeout", &self.timeout)
            .finish()
    }
}
