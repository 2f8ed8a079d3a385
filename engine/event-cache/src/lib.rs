//! # Event Cache
//!
//! Cache layer for event info lookups and the cache-aside read path built
//! on top of it.
//!
//! A read checks the cache first. On a miss, or when the cache itself
//! fails, the storage engine answers and the result is written back with a
//! TTL. Entries are never invalidated; they only expire.

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod reader;
pub mod redis_cache;

use std::sync::Arc;

pub use cache::EventInfoCache;
pub use config::{CacheBackend, CacheConfig};
pub use error::{CacheError, ReadError, Result};
pub use memory::MemoryEventCache;
pub use reader::EventInfoReader;
pub use redis_cache::RedisEventCache;

/// Build the cache backend selected by `config`
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn EventInfoCache>> {
    match config.backend {
        CacheBackend::Redis => Ok(Arc::new(RedisEventCache::connect(config).await?)),
        CacheBackend::Memory => Ok(Arc::new(MemoryEventCache::new())),
    }
}
