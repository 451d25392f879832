//! Application layer for the Story Generation context.

mod keyed_lock;
pub mod orchestrator;
pub mod story_handle;
