//! Error types for the stream source

use thiserror::Error;

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Every receiver is gone
    #[error("Record queue closed")]
    Closed,

    #[error("Feed I/O error: {0}")]
    Io(#[from] std::io::Error),
}
