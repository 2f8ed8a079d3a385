//! Cache layer trait

use async_trait::async_trait;
use rsvp_core::EventInfo;
use std::time::Duration;

use crate::error::Result;

/// Key-value store for event info with per-entry TTL
#[async_trait]
pub trait EventInfoCache: Send + Sync {
    /// `Ok(None)` is a miss; `Err` means the cache could not answer
    async fn get(&self, event_id: &str) -> Result<Option<EventInfo>>;

    async fn set(&self, event_id: &str, info: &EventInfo, ttl: Duration) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}
