//! Shared HTTP plumbing for the Gemini adapters.

use std::sync::Arc;
use std::time::Duration;

use piggybook_core::error::ProviderError;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::wire::{GenerateContentRequest, GenerateContentResponse};

/// Longest error body kept in a `ProviderError::Failed` message.
const MAX_ERROR_BODY: usize = 512;

/// A `generateContent` caller shared by the three adapters.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: Arc<GeminiConfig>,
}

impl GeminiClient {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Failed` if the TLS backend cannot be set up.
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Failed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Settings the client was built with.
    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Calls `models/{model}:generateContent`.
    ///
    /// # Errors
    ///
    /// HTTP 429 maps to `RateLimited`, any other non-success status or
    /// transport failure to `Failed`, and an unreadable body to
    /// `InvalidResponse`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let url = format!("{}/models/{model}:generateContent", self.config.base_url);
        debug!(model, "calling generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Failed(format!("request to {model} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{model}: {e}")))
    }
}

/// Maps a non-success status to the provider error taxonomy.
#[must_use]
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited { retry_after };
    }
    let mut message = body.trim().to_owned();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    ProviderError::Failed(format!("HTTP {}: {message}", status.as_u16()))
}

/// Parses a `Retry-After` header given in whole seconds.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
