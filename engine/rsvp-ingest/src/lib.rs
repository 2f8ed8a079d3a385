//! # RSVP Ingestion
//!
//! A fixed set of workers drains the shared record queue and persists each
//! RSVP through the storage engine under a per-record deadline. A failed or
//! slow record is logged, counted and dropped; it never stalls the other
//! workers. Concurrent increments of the same daily counter are left to the
//! storage engine's atomic upsert.

pub mod config;
pub mod error;
pub mod pool;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use pool::{IngestionPool, PoolState};
