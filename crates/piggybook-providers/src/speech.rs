//! Narration audio synthesis.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use piggybook_core::error::ProviderError;
use piggybook_core::provider::SpeechSynthesizer;
use piggybook_core::story::AudioBytes;
use tracing::instrument;

use crate::client::GeminiClient;
use crate::wire::{GenerateContentRequest, GenerateContentResponse, GenerationConfig, SpeechConfig};

/// Reading instruction prepended to the page text.
pub const NARRATION_STYLE: &str = "Read this story page warmly and slowly:";

/// Speech prompt for a page's text.
#[must_use]
pub fn narration_prompt(text: &str) -> String {
    format!("{NARRATION_STYLE} {text}")
}

/// Decodes the raw PCM the provider returned, if any.
///
/// # Errors
///
/// Returns `ProviderError::InvalidResponse` if the payload is not base64.
pub fn audio_from_response(
    response: &GenerateContentResponse,
) -> Result<Option<AudioBytes>, ProviderError> {
    let Some(data) = response.inline_data() else {
        return Ok(None);
    };
    let bytes = STANDARD
        .decode(data.data.as_bytes())
        .map_err(|e| ProviderError::InvalidResponse(format!("audio payload: {e}")))?;
    Ok((!bytes.is_empty()).then_some(AudioBytes(bytes)))
}

/// [`SpeechSynthesizer`] over the Gemini TTS model. Returns 16-bit
/// little-endian mono PCM at 24 kHz.
#[derive(Debug, Clone)]
pub struct GeminiSpeechSynthesizer {
    client: GeminiClient,
}

impl GeminiSpeechSynthesizer {
    /// Creates a narration synthesizer over `client`.
    #[must_use]
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeechSynthesizer {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn synthesize(&self, text: &str) -> Result<Option<AudioBytes>, ProviderError> {
        let config = self.client.config();
        let request =
            GenerateContentRequest::text(narration_prompt(text)).with_config(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_owned()]),
                speech_config: Some(SpeechConfig::prebuilt(config.voice.clone())),
                ..GenerationConfig::default()
            });
        let response = self
            .client
            .generate_content(&config.speech_model, &request)
            .await?;
        audio_from_response(&response)
    }
}
