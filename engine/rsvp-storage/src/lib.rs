//! # RSVP Storage Engine
//!
//! Durable persistence of incoming RSVPs together with their denormalized
//! reference data, and the per-day popularity counters derived from them.
//!
//! ## Architecture
//!
//! - **RsvpStore**: trait implemented by every backend
//! - **PostgresStore**: sqlx-backed implementation, one transaction per save
//! - **InMemoryStore**: single-lock implementation with identical semantics
//!
//! Saving an RSVP writes the venue, group, member and event rows if absent
//! (first write wins), inserts the RSVP fact row, and for confirmed RSVPs
//! bumps the `(day, event)` counter with a single upsert. Either all of it
//! commits or none of it does.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;

pub use config::{DatabaseConfig, StorageBackend, StorageConfig};
pub use error::{Result, StorageError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::RsvpStore;

/// Build the backend selected by `config`.
///
/// For Postgres this connects, applies migrations and fails if the database
/// is unreachable.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn RsvpStore>> {
    match config.backend {
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(&config.database).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage backend, data will not survive a restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
