//! Domain layer for the Story Generation context.

pub mod commands;
pub mod phase;
