//! Configuration for the cache layer and read path

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which backend serves the cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis connection URL
    pub redis_url: String,
    /// Prefix of every cache key
    pub key_prefix: String,
    /// Lifetime of a cached event info
    pub ttl_secs: u64,
    /// Budget of one cache read; past it the read falls back to storage
    pub get_timeout_ms: u64,
    /// Budget of one warm-up write, independent of the request
    pub set_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "event_info".to_string(),
            ttl_secs: 600, // 10 minutes
            get_timeout_ms: 200,
            set_timeout_ms: 500,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.get_timeout_ms)
    }

    pub fn set_timeout(&self) -> Duration {
        Duration::from_millis(self.set_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend == CacheBackend::Redis && self.redis_url.is_empty() {
            return Err("cache redis_url must not be empty".to_string());
        }

        if self.ttl_secs == 0 {
            return Err("cache ttl_secs must be greater than 0".to_string());
        }

        if self.get_timeout_ms == 0 {
            return Err("cache get_timeout_ms must be greater than 0".to_string());
        }

        if self.set_timeout_ms == 0 {
            return Err("cache set_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}
