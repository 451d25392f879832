//! Command envelope shared by the request-driven services.

use uuid::Uuid;

/// A request entering one of the services.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable name used as the `command` field in log records.
    fn command_type(&self) -> &'static str;

    /// Identifier tying together every log record and provider call made on
    /// behalf of one request.
    fn correlation_id(&self) -> Uuid;
}

/// Generates a fresh, time-ordered correlation identifier.
#[must_use]
pub fn new_correlation_id() -> Uuid {
    Uuid::now_v7()
}
