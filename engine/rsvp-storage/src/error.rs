//! Error types for the storage engine

use rsvp_core::CoreError;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// No event row matches the requested id
    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: String },

    /// The RSVP fact row already exists; the whole save was rolled back
    #[error("RSVP {rsvp_id} already stored")]
    DuplicateRsvp { rsvp_id: i64 },

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage closed")]
    Closed,
}

impl StorageError {
    pub fn not_found(event_id: impl Into<String>) -> Self {
        Self::EventNotFound { event_id: event_id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EventNotFound { .. })
    }
}
