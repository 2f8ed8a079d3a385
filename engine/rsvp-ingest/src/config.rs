//! Configuration for the ingestion pool

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ingestion pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Deadline of one save, measured from the start of the attempt
    pub save_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { workers: 8, save_timeout_ms: 5000 }
    }
}

impl IngestConfig {
    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("ingest workers must be greater than 0".to_string());
        }

        if self.save_timeout_ms == 0 {
            return Err("ingest save_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}
