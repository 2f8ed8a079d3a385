//! # rsvp-core
//!
//! Shared types for the RSVP ingestion system: the wire model of an incoming
//! RSVP and its reference data, the derived read models served by the query
//! surface, UTC day bucketing for the popularity counters, and the
//! observability sink injected into every component.

pub mod day;
pub mod error;
pub mod metrics;
pub mod model;

pub use day::{day_bucket, day_start};
pub use error::{CoreError, Result};
pub use metrics::{CounterSink, Metric, MetricsSink, NoopSink, Timing};
pub use model::{Event, EventInfo, Group, GroupTopic, Member, Rsvp, TopkEvent, Venue};

/// Response value that marks an RSVP as confirmed.
pub const CONFIRMED_RESPONSE: &str = "yes";
