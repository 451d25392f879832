//! Piggybook Cache: whole-document story cache with pluggable stores.
//!
//! The cache fails open: a store that cannot be read behaves as a miss and
//! a store that cannot be written only produces a warning.

pub mod content_cache;
pub mod file_store;
pub mod memory_store;
pub mod pg_store;

pub use content_cache::{CachedStory, ContentCache};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use pg_store::PgCacheStore;
