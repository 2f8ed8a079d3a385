//! Error types for the ingestion pool

use thiserror::Error;

use crate::pool::PoolState;

/// Result type alias for ingestion pool operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot start pool in state {0:?}")]
    AlreadyStarted(PoolState),
}
