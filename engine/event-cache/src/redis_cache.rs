//! Redis cache backend

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use rsvp_core::EventInfo;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::EventInfoCache;
use crate::config::CacheConfig;
use crate::error::Result;

/// Event info cache stored as JSON strings in Redis
pub struct RedisEventCache {
    connection_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisEventCache {
    /// Connect and verify the server answers PING
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut connection_manager = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut connection_manager).await?;
        info!(url = %config.redis_url, "Connected to Redis");

        Ok(Self { connection_manager, key_prefix: config.key_prefix.clone() })
    }

    fn key(&self, event_id: &str) -> String {
        format!("{}:{}", self.key_prefix, event_id)
    }
}

/// Redis expiries are whole seconds; round up so an entry lives at least
/// its TTL. Zero is rejected by `SET EX`.
fn ttl_seconds(ttl: Duration) -> u64 {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

#[async_trait]
impl EventInfoCache for RedisEventCache {
    async fn get(&self, event_id: &str) -> Result<Option<EventInfo>> {
        let key = self.key(event_id);
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(data) => {
                debug!("Cache hit for key: {}", key);
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => {
                debug!("Cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, event_id: &str, info: &EventInfo, ttl: Duration) -> Result<()> {
        let key = self.key(event_id);
        let serialized = serde_json::to_string(info)?;
        let seconds = ttl_seconds(ttl);

        let mut conn = self.connection_manager.clone();
        let _: () = conn.set_ex(&key, serialized, seconds).await?;
        debug!("Cached data for key: {} with TTL: {}s", key, seconds);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
