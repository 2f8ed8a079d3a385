//! Storage engine trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rsvp_core::{EventInfo, Rsvp, TopkEvent};

use crate::error::Result;

/// Operations every storage backend provides.
///
/// Callers bound each call with their own deadline; dropping an unfinished
/// `save_rsvp` future abandons its transaction without committing anything.
#[async_trait]
pub trait RsvpStore: Send + Sync {
    /// Persist one RSVP and its reference data atomically.
    ///
    /// Reference rows are inserted only if absent. A confirmed RSVP also
    /// increments the counter of its UTC mutation day. An RSVP id that is
    /// already stored fails the whole save with `DuplicateRsvp`.
    async fn save_rsvp(&self, rsvp: &Rsvp) -> Result<()>;

    /// The `k` most confirmed events on the UTC day containing `date`,
    /// ordered by count descending, then by event id.
    async fn topk_events(&self, date: DateTime<Utc>, k: u32) -> Result<Vec<TopkEvent>>;

    /// Group and venue of an event; `EventNotFound` when the id is unknown.
    async fn get_event_info(&self, event_id: &str) -> Result<EventInfo>;

    /// Release backend resources. Later calls fail.
    async fn close(&self);

    fn backend_name(&self) -> &'static str;
}
