//! In-process cache backend

use async_trait::async_trait;
use dashmap::DashMap;
use rsvp_core::EventInfo;
use std::time::{Duration, Instant};

use crate::cache::EventInfoCache;
use crate::error::Result;

struct Entry {
    json: String,
    expires_at: Instant,
}

/// Event info cache held in a concurrent map.
///
/// Values are stored serialized, as in Redis, so a hit returns exactly what
/// was written. Expired entries read as misses and are evicted on access.
#[derive(Default)]
pub struct MemoryEventCache {
    entries: DashMap<String, Entry>,
}

impl MemoryEventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.entries.get(event_id).is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

#[async_trait]
impl EventInfoCache for MemoryEventCache {
    async fn get(&self, event_id: &str) -> Result<Option<EventInfo>> {
        let now = Instant::now();

        match self.entries.get(event_id) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > now => return Ok(Some(serde_json::from_str(&entry.json)?)),
            Some(_) => {}
        }

        // Read guard is released above; removing under it would deadlock the shard
        self.entries.remove_if(event_id, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, event_id: &str, info: &EventInfo, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(info)?;
        self.entries.insert(event_id.to_string(), Entry { json, expires_at: Instant::now() + ttl });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_core::{Group, Venue};

    fn info(confirmed: i64) -> EventInfo {
        EventInfo {
            group: Group {
                id: 1,
                name: "group".to_string(),
                country: "us".to_string(),
                state: String::new(),
                city: "city".to_string(),
                lat: 1.0,
                lon: 2.0,
                urlname: "group".to_string(),
                topics: Vec::new(),
            },
            venue: Venue { id: 2, name: "venue".to_string(), lat: 3.0, lon: 4.0 },
            confirmed_rsvps: Some(confirmed),
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryEventCache::new();
        assert_eq!(cache.get("event_id1").await.unwrap(), None);

        cache.set("event_id1", &info(3), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("event_id1").await.unwrap(), Some(info(3)));
        assert!(cache.contains("event_id1"));
        assert!(!cache.contains("event_id2"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = MemoryEventCache::new();
        cache.set("event_id1", &info(3), Duration::from_secs(60)).await.unwrap();
        cache.set("event_id1", &info(4), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("event_id1").await.unwrap(), Some(info(4)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_evicted() {
        let cache = MemoryEventCache::new();
        cache.set("event_id1", &info(3), Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!cache.contains("event_id1"));
        assert_eq!(cache.get("event_id1").await.unwrap(), None);
        assert!(cache.is_empty());
    }
}
