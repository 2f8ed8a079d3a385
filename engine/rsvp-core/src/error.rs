//! Error types for the core model

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while turning a raw payload into a typed RSVP
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Timestamp out of range in field {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: i64 },
}
