//! Observability sink injected into the ingestion and read components
//!
//! Components never touch a global registry; they report through a
//! [`MetricsSink`] handed to them at construction. The service bridges the
//! sink to Prometheus, tests use [`CounterSink`] to assert on outcomes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const METRIC_COUNT: usize = 10;

/// Counters reported by the components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    StreamMessages,
    StreamInvalidMessages,
    RsvpSaved,
    RsvpSaveFailed,
    RsvpSaveTimeout,
    CacheHit,
    CacheMiss,
    CacheError,
    CacheSetFailed,
    EventInfoNotFound,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::StreamMessages,
        Metric::StreamInvalidMessages,
        Metric::RsvpSaved,
        Metric::RsvpSaveFailed,
        Metric::RsvpSaveTimeout,
        Metric::CacheHit,
        Metric::CacheMiss,
        Metric::CacheError,
        Metric::CacheSetFailed,
        Metric::EventInfoNotFound,
    ];

    /// Exported counter name
    pub fn name(&self) -> &'static str {
        match self {
            Metric::StreamMessages => "rsvp_stream_messages_total",
            Metric::StreamInvalidMessages => "rsvp_stream_invalid_messages_total",
            Metric::RsvpSaved => "rsvp_saved_total",
            Metric::RsvpSaveFailed => "rsvp_save_failed_total",
            Metric::RsvpSaveTimeout => "rsvp_save_timeout_total",
            Metric::CacheHit => "event_info_cache_hit_total",
            Metric::CacheMiss => "event_info_cache_miss_total",
            Metric::CacheError => "event_info_cache_error_total",
            Metric::CacheSetFailed => "event_info_cache_set_failed_total",
            Metric::EventInfoNotFound => "event_info_not_found_total",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Latencies reported by the components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    RsvpSave,
    EventInfoLoad,
}

impl Timing {
    pub fn name(&self) -> &'static str {
        match self {
            Timing::RsvpSave => "rsvp_save_duration_seconds",
            Timing::EventInfoLoad => "event_info_load_duration_seconds",
        }
    }
}

/// Destination for counters and latencies
pub trait MetricsSink: Send + Sync {
    fn increment(&self, metric: Metric);

    fn record_duration(&self, _timing: Timing, _elapsed: Duration) {}
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _metric: Metric) {}
}

/// In-process counters, readable back by the caller
pub struct CounterSink {
    counters: [AtomicU64; METRIC_COUNT],
    timings: AtomicU64,
}

impl CounterSink {
    pub fn new() -> Self {
        Self { counters: std::array::from_fn(|_| AtomicU64::new(0)), timings: AtomicU64::new(0) }
    }

    pub fn get(&self, metric: Metric) -> u64 {
        self.counters[metric.index()].load(Ordering::Relaxed)
    }

    /// Number of latency samples recorded so far
    pub fn timing_samples(&self) -> u64 {
        self.timings.load(Ordering::Relaxed)
    }

    /// Current value of every counter, in declaration order
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        Metric::ALL.iter().map(|m| (m.name(), self.get(*m))).collect()
    }
}

impl Default for CounterSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CounterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

impl MetricsSink for CounterSink {
    fn increment(&self, metric: Metric) {
        self.counters[metric.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, _timing: Timing, _elapsed: Duration) {
        self.timings.fetch_add(1, Ordering::Relaxed);
    }
}
