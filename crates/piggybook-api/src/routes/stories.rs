//! Routes for the Story Generation context.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use piggybook_core::fingerprint::RequestFingerprint;
use piggybook_core::story::{Page, StoryDocument};
use piggybook_generation::domain::commands::{FillPageImage, GenerateStory};
use piggybook_generation::{GenerationError, ImageFill, StorySource};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /api/v1/stories.
#[derive(Debug, Deserialize)]
pub struct StartStoryRequest {
    /// Reader age in years.
    pub age: u32,
    /// What the story should teach.
    pub concept: String,
}

/// Response body for story start.
#[derive(Debug, Serialize)]
pub struct StartStoryResponse {
    /// Key to look the story up again.
    pub fingerprint: RequestFingerprint,
    /// Whether the story was served from cache or generated.
    pub source: StorySource,
    /// The full story document.
    pub story: StoryDocument,
}

/// Response body for story lookup.
#[derive(Debug, Serialize)]
pub struct StoryResponse {
    /// The requested fingerprint.
    pub fingerprint: RequestFingerprint,
    /// The story document, with any illustrations filled so far.
    pub story: StoryDocument,
}

/// What happened to a page's illustration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// A new illustration was generated and stored.
    Attached,
    /// The page was already illustrated.
    AlreadyPresent,
    /// Another request is illustrating this page.
    InProgress,
    /// The provider returned no image.
    NoImage,
}

impl From<&ImageFill> for ImageStatus {
    fn from(fill: &ImageFill) -> Self {
        match fill {
            ImageFill::Attached(_) => Self::Attached,
            ImageFill::AlreadyPresent(_) => Self::AlreadyPresent,
            ImageFill::InProgress => Self::InProgress,
            ImageFill::NoImage => Self::NoImage,
        }
    }
}

/// Response body for page image fill.
#[derive(Debug, Serialize)]
pub struct PageImageResponse {
    /// The story the page belongs to.
    pub fingerprint: RequestFingerprint,
    /// What the fill did.
    pub status: ImageStatus,
    /// The page as it is now stored.
    pub page: Page,
}

fn parse_fingerprint(raw: &str) -> Result<RequestFingerprint, ApiError> {
    raw.parse()
        .map_err(|e| ApiError(GenerationError::InvalidRequest(format!("{e}"))))
}

/// POST /api/v1/stories
#[instrument(skip(state, request), fields(age = request.age))]
async fn start_story(
    State(state): State<AppState>,
    Json(request): Json<StartStoryRequest>,
) -> Result<Json<StartStoryResponse>, ApiError> {
    let command = GenerateStory::new(request.age, request.concept);

    info!(correlation_id = %command.correlation_id, "handling generate_story command");

    let outcome = state.orchestrator.start(&command).await?;
    Ok(Json(StartStoryResponse {
        fingerprint: outcome.story.fingerprint().clone(),
        source: outcome.source,
        story: outcome.story.snapshot().await,
    }))
}

/// GET /api/v1/stories/{fingerprint}
#[instrument(skip(state))]
async fn get_story(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> Result<Json<StoryResponse>, ApiError> {
    let fingerprint = parse_fingerprint(&fingerprint)?;
    let story = state.orchestrator.story(&fingerprint).await?;
    Ok(Json(StoryResponse {
        fingerprint,
        story: story.snapshot().await,
    }))
}

/// POST /api/v1/stories/{fingerprint}/pages/{page_number}/image
#[instrument(skip(state))]
async fn fill_page_image(
    State(state): State<AppState>,
    Path((fingerprint, page_number)): Path<(String, u32)>,
) -> Result<Json<PageImageResponse>, ApiError> {
    let command = FillPageImage::new(parse_fingerprint(&fingerprint)?, page_number);

    info!(correlation_id = %command.correlation_id, "handling fill_page_image command");

    let fill = state.orchestrator.fill_page_image(&command).await?;
    let story = state.orchestrator.story(&command.fingerprint).await?;
    let page = story
        .page(page_number)
        .await
        .ok_or_else(|| GenerationError::PageNotFound {
            fingerprint: command.fingerprint.clone(),
            page_number,
        })?;

    Ok(Json(PageImageResponse {
        fingerprint: command.fingerprint,
        status: ImageStatus::from(&fill),
        page,
    }))
}

/// Returns the story router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_story))
        .route("/{fingerprint}", get(get_story))
        .route("/{fingerprint}/pages/{page_number}/image", post(fill_page_image))
}
