//! Configuration for the stream source

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stream source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bound of the queue between the feed and the workers
    pub queue_capacity: usize,
    /// JSONL file to read; standard input when unset
    pub feed_path: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024, feed_path: None }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("stream queue_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}
