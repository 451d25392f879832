//! Page illustration generation.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use piggybook_core::error::ProviderError;
use piggybook_core::provider::ImageGenerator;
use piggybook_core::story::ImageRef;
use tracing::{debug, instrument};

use crate::client::GeminiClient;
use crate::wire::{GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig};

/// Style applied to every page prompt.
pub const ILLUSTRATION_STYLE: &str =
    "Children's book illustration, watercolor style, soft colors, adorable character.";

/// Illustration prompt for one page.
#[must_use]
pub fn illustration_prompt(page_prompt: &str) -> String {
    format!("{ILLUSTRATION_STYLE} {page_prompt}")
}

/// Turns the first inline image of a response into a data URL.
///
/// Returns `Ok(None)` when the response carries no image.
///
/// # Errors
///
/// Returns `ProviderError::InvalidResponse` if the payload is not base64.
pub fn image_from_response(
    response: &GenerateContentResponse,
) -> Result<Option<ImageRef>, ProviderError> {
    let Some(data) = response.inline_data() else {
        return Ok(None);
    };
    STANDARD
        .decode(data.data.as_bytes())
        .map_err(|e| ProviderError::InvalidResponse(format!("image payload: {e}")))?;
    let mime = if data.mime_type.is_empty() {
        "image/png"
    } else {
        data.mime_type.as_str()
    };
    Ok(Some(ImageRef(format!("data:{mime};base64,{}", data.data))))
}

/// [`ImageGenerator`] over a Gemini image model.
#[derive(Debug, Clone)]
pub struct GeminiImageGenerator {
    client: GeminiClient,
}

impl GeminiImageGenerator {
    /// Creates an illustration generator over `client`.
    #[must_use]
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    #[instrument(skip_all)]
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageRef>, ProviderError> {
        let request =
            GenerateContentRequest::text(illustration_prompt(prompt)).with_config(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: "1:1".to_owned(),
                }),
                ..GenerationConfig::default()
            });
        let response = self
            .client
            .generate_content(&self.client.config().image_model, &request)
            .await?;
        let image = image_from_response(&response)?;
        if image.is_none() {
            debug!("image response carried no inline data");
        }
        Ok(image)
    }
}
