//! Shared application state.

use std::sync::Arc;

use piggybook_cache::{ContentCache, FileStore, MemoryStore, PgCacheStore};
use piggybook_core::clock::SystemClock;
use piggybook_core::store::CacheStore;
use piggybook_generation::StoryOrchestrator;
use piggybook_providers::{GeminiClient, GeminiImageGenerator, GeminiStoryGenerator};
use sqlx::postgres::PgPoolOptions;

use crate::config::{AppConfig, CacheBackend};
use crate::error::AppError;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Story generation and image fill.
    pub orchestrator: Arc<StoryOrchestrator>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(orchestrator: Arc<StoryOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Wires the configured cache store and the Gemini providers.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database is unreachable, migrations fail or
    /// the HTTP client cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let store: Arc<dyn CacheStore> = match &config.cache {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::File(dir) => Arc::new(FileStore::new(dir.clone())),
            CacheBackend::Postgres(url) => {
                let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                PgCacheStore::run_migrations(&pool).await?;
                Arc::new(PgCacheStore::new(pool))
            }
        };

        let client = GeminiClient::new(config.gemini.clone())?;
        let orchestrator = StoryOrchestrator::new(
            ContentCache::new(store, Arc::new(SystemClock)),
            Arc::new(GeminiStoryGenerator::new(client.clone())),
            Arc::new(GeminiImageGenerator::new(client)),
            config.policy,
        );
        Ok(Self::new(Arc::new(orchestrator)))
    }
}
