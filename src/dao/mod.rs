/// Per-room change notifications and the store decorator that emits them.
pub mod change_feed;
/// Database model definitions.
pub mod models;
/// Read-through prompt cache.
pub mod prompt_cache;
/// Record store trait and its backends.
pub mod record_store;
/// Storage abstraction layer for database operations.
pub mod storage;
