//! `PostgreSQL` implementation of the `CacheStore` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use piggybook_core::error::StorageError;
use piggybook_core::store::CacheStore;

fn database_error(err: &sqlx::Error) -> StorageError {
    StorageError::Database(err.to_string())
}

/// PostgreSQL-backed cache store over the `story_cache` table.
#[derive(Debug, Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    /// Creates a new `PgCacheStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the workspace migrations to `pool`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Database` if a migration fails.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM story_cache WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error(&e))
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO story_cache (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error(&e))?;
        Ok(())
    }
}
