//! Cache-aside read path for event info

use rsvp_core::{EventInfo, Metric, MetricsSink, Timing};
use rsvp_storage::RsvpStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::cache::EventInfoCache;
use crate::config::CacheConfig;
use crate::error::ReadError;

/// Answers event info reads from the cache, falling back to storage
pub struct EventInfoReader {
    cache: Arc<dyn EventInfoCache>,
    store: Arc<dyn RsvpStore>,
    metrics: Arc<dyn MetricsSink>,
    ttl: Duration,
    get_timeout: Duration,
    set_timeout: Duration,
}

impl EventInfoReader {
    pub fn new(
        cache: Arc<dyn EventInfoCache>,
        store: Arc<dyn RsvpStore>,
        metrics: Arc<dyn MetricsSink>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            cache,
            store,
            metrics,
            ttl: config.ttl(),
            get_timeout: config.get_timeout(),
            set_timeout: config.set_timeout(),
        }
    }

    /// Event info for `event_id`.
    ///
    /// A cache failure or a cache read past its deadline is logged and
    /// treated as a miss. A value loaded from
    /// storage is written back before returning; that write runs on its own
    /// task under its own timeout, so neither a slow cache nor a dropped
    /// caller can hold it up or cut it short.
    pub async fn get_event_info(&self, event_id: &str) -> Result<EventInfo, ReadError> {
        match tokio::time::timeout(self.get_timeout, self.cache.get(event_id)).await {
            Ok(Ok(Some(info))) => {
                self.metrics.increment(Metric::CacheHit);
                return Ok(info);
            }
            Ok(Ok(None)) => self.metrics.increment(Metric::CacheMiss),
            Ok(Err(e)) => {
                self.metrics.increment(Metric::CacheError);
                warn!(event_id, error = %e, "Event info cache read failed, falling back to storage");
            }
            Err(_) => {
                self.metrics.increment(Metric::CacheError);
                warn!(
                    event_id,
                    timeout_ms = self.get_timeout.as_millis() as u64,
                    "Timed out reading event info cache, falling back to storage"
                );
            }
        }

        let started = Instant::now();
        let loaded = self.store.get_event_info(event_id).await;
        self.metrics.record_duration(Timing::EventInfoLoad, started.elapsed());

        let info = match loaded {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                self.metrics.increment(Metric::EventInfoNotFound);
                debug!(event_id, "Event not found");
                return Err(ReadError::NotFound { event_id: event_id.to_string() });
            }
            Err(e) => return Err(ReadError::Storage(e)),
        };

        self.warm_cache(event_id, &info).await;
        Ok(info)
    }

    async fn warm_cache(&self, event_id: &str, info: &EventInfo) {
        let cache = Arc::clone(&self.cache);
        let metrics = Arc::clone(&self.metrics);
        let event_id = event_id.to_string();
        let info = info.clone();
        let ttl = self.ttl;
        let set_timeout = self.set_timeout;

        let warm_up = tokio::spawn(async move {
            match tokio::time::timeout(set_timeout, cache.set(&event_id, &info, ttl)).await {
                Ok(Ok(())) => debug!(event_id = %event_id, ttl_secs = ttl.as_secs(), "Event info cached"),
                Ok(Err(e)) => {
                    metrics.increment(Metric::CacheSetFailed);
                    warn!(event_id = %event_id, error = %e, "Failed to cache event info");
                }
                Err(_) => {
                    metrics.increment(Metric::CacheSetFailed);
                    warn!(
                        event_id = %event_id,
                        timeout_ms = set_timeout.as_millis() as u64,
                        "Timed out caching event info"
                    );
                }
            }
        });

        if let Err(e) = warm_up.await {
            error!(error = %e, "Event info cache warm-up task failed");
        }
    }
}
