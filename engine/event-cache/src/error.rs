//! Error types for the cache layer and read path

use rsvp_storage::StorageError;
use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures of the cache itself; never surfaced to readers
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a failed event info read
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Event not found: {event_id}")]
    NotFound { event_id: String },

    #[error("Storage error: {0}")]
    Storage(StorageError),
}
