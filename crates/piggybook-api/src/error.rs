//! Piggybook API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use piggybook_core::error::{ProviderError, StorageError};
use piggybook_generation::GenerationError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The cache store could not be prepared.
    #[error("cache store error: {0}")]
    Storage(#[from] StorageError),

    /// A provider client could not be built.
    #[error("provider setup error: {0}")]
    Provider(#[from] ProviderError),

    /// Tracing or span export could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Reader-facing message.
    pub message: &'static str,
}

/// HTTP-layer wrapper around `GenerationError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub GenerationError);

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            GenerationError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GenerationError::NotFound(_) => (StatusCode::NOT_FOUND, "story_not_found"),
            GenerationError::PageNotFound { .. } => (StatusCode::NOT_FOUND, "page_not_found"),
            GenerationError::Failed(ProviderError::RateLimited { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_busy")
            }
            GenerationError::Failed(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            GenerationError::InvalidDocument(_) => (StatusCode::BAD_GATEWAY, "invalid_story"),
            GenerationError::ImageFailed(_) => (StatusCode::BAD_GATEWAY, "image_failed"),
        };

        if status.is_server_error() {
            tracing::warn!(error = %self.0, code = error_code, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.0.user_message(),
        };

        (status, Json(body)).into_response()
    }
}
