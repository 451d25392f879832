//! Startup configuration read from the environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use piggybook_core::retry::BackoffPolicy;
use piggybook_providers::GeminiConfig;

use crate::error::AppError;

/// Where cached stories live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Process memory; lost on restart.
    Memory,
    /// One JSON file per story under a directory.
    File(PathBuf),
    /// The `story_cache` table of a PostgreSQL database.
    Postgres(String),
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::File(dir) => write!(f, "file ({})", dir.display()),
            Self::Postgres(_) => f.write_str("postgres"),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address to bind (`HOST`).
    pub host: String,
    /// Port to bind (`PORT`).
    pub port: u16,
    /// Cache store selection (`CACHE_BACKEND`).
    pub cache: CacheBackend,
    /// Gemini credentials and endpoint.
    pub gemini: GeminiConfig,
    /// Retry policy for provider calls.
    pub policy: BackoffPolicy,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a missing required variable or an
    /// unparseable value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;

        let cache = match lookup("CACHE_BACKEND").as_deref().unwrap_or("file") {
            "memory" => CacheBackend::Memory,
            "file" => CacheBackend::File(
                lookup("CACHE_DIR").map_or_else(|| PathBuf::from(".piggybook-cache"), PathBuf::from),
            ),
            "postgres" => CacheBackend::Postgres(lookup("DATABASE_URL").ok_or_else(|| {
                AppError::Config("DATABASE_URL must be set when CACHE_BACKEND=postgres".to_owned())
            })?),
            other => {
                return Err(AppError::Config(format!(
                    "CACHE_BACKEND must be memory, file or postgres, got {other:?}"
                )));
            }
        };

        let api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY environment variable must be set".to_owned()))?;
        let mut gemini = GeminiConfig::new(api_key);
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            gemini = gemini.with_base_url(base_url);
        }

        let defaults = BackoffPolicy::default();
        let max_attempts = parse_or(&lookup, "BACKOFF_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(AppError::Config(
                "BACKOFF_MAX_ATTEMPTS must be at least 1".to_owned(),
            ));
        }
        let initial_delay_ms = parse_or(
            &lookup,
            "BACKOFF_INITIAL_DELAY_MS",
            u64::try_from(defaults.initial_delay.as_millis()).unwrap_or(u64::MAX),
        )?;

        Ok(Self {
            host,
            port,
            cache,
            gemini,
            policy: BackoffPolicy::new(max_attempts, Duration::from_millis(initial_delay_ms)),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_the_key_is_set() {
        // Arrange / Act
        let config = config_from(&[("GEMINI_API_KEY", "k")]).unwrap();

        // Assert
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache, CacheBackend::File(PathBuf::from(".piggybook-cache")));
        assert_eq!(config.policy, BackoffPolicy::default());
    }

    #[test]
    fn test_missing_api_key_fails_startup() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, AppError::Config(message) if message.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let missing = config_from(&[("GEMINI_API_KEY", "k"), ("CACHE_BACKEND", "postgres")]);
        let present = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("CACHE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/piggybook"),
        ]);

        assert!(missing.is_err());
        assert_eq!(
            present.unwrap().cache,
            CacheBackend::Postgres("postgres://localhost/piggybook".to_owned())
        );
    }

    #[test]
    fn test_backoff_and_endpoint_overrides_are_read() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://localhost:9999/v1beta"),
            ("BACKOFF_MAX_ATTEMPTS", "5"),
            ("BACKOFF_INITIAL_DELAY_MS", "250"),
            ("CACHE_BACKEND", "memory"),
        ])
        .unwrap();

        assert_eq!(config.gemini.base_url, "http://localhost:9999/v1beta");
        assert_eq!(config.policy, BackoffPolicy::new(5, Duration::from_millis(250)));
        assert_eq!(config.cache, CacheBackend::Memory);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for vars in [
            [("GEMINI_API_KEY", "k"), ("PORT", "eighty")],
            [("GEMINI_API_KEY", "k"), ("BACKOFF_MAX_ATTEMPTS", "0")],
            [("GEMINI_API_KEY", "k"), ("CACHE_BACKEND", "redis")],
        ] {
            assert!(config_from(&vars).is_err(), "{vars:?} should be rejected");
        }
    }
}
