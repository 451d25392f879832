//! Clock abstraction for determinism.
//!
//! Wall-clock timestamps only appear in persisted cache envelopes. Elapsed
//! time for backoff and highlighting is measured with `tokio::time`, which
//! tests pause and advance directly.

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
