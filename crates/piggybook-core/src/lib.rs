//! Piggybook Core: shared domain abstractions.
//!
//! This crate defines the story document model, request fingerprints, the
//! error taxonomy, the ports every adapter implements, and the backoff
//! executor used in front of rate-limited providers. It contains no
//! infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod fingerprint;
pub mod provider;
pub mod retry;
pub mod store;
pub mod story;
