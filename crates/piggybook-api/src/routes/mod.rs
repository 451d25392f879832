//! Route modules.

pub mod health;
pub mod stories;
