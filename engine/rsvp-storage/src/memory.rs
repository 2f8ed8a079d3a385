//! In-memory storage backend
//!
//! Every save takes the one table lock, so a save is atomic with respect to
//! every other save and read. Used in tests and for local runs without a
//! database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rsvp_core::{day_bucket, Event, EventInfo, Group, Member, Rsvp, TopkEvent, Venue};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::store::RsvpStore;

struct StoredEvent {
    event: Event,
    venue_id: i64,
    group_id: i64,
}

#[derive(Default)]
struct Tables {
    venues: HashMap<i64, Venue>,
    groups: HashMap<i64, Group>,
    members: HashMap<i64, Member>,
    events: HashMap<String, StoredEvent>,
    rsvps: HashMap<i64, Rsvp>,
    daily: HashMap<(NaiveDate, String), i64>,
    closed: bool,
}

/// Storage backend held entirely in process memory
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored RSVP fact rows
    pub async fn rsvp_count(&self) -> usize {
        self.tables.lock().await.rsvps.len()
    }

    /// Confirmed count of one `(day, event)` counter, zero when absent
    pub async fn confirmed_on(&self, day: NaiveDate, event_id: &str) -> i64 {
        let tables = self.tables.lock().await;
        tables.daily.get(&(day, event_id.to_string())).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RsvpStore for InMemoryStore {
    async fn save_rsvp(&self, rsvp: &Rsvp) -> Result<()> {
        let day = rsvp.day()?;
        rsvp.event.time_utc()?;

        let mut tables = self.tables.lock().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        // Checked before any write so a duplicate leaves no trace
        if tables.rsvps.contains_key(&rsvp.id) {
            return Err(StorageError::DuplicateRsvp { rsvp_id: rsvp.id });
        }

        tables.venues.entry(rsvp.venue.id).or_insert_with(|| rsvp.venue.clone());
        tables.groups.entry(rsvp.group.id).or_insert_with(|| rsvp.group.clone());
        tables.members.entry(rsvp.member.id).or_insert_with(|| rsvp.member.clone());
        tables.events.entry(rsvp.event.id.clone()).or_insert_with(|| StoredEvent {
            event: rsvp.event.clone(),
            venue_id: rsvp.venue.id,
            group_id: rsvp.group.id,
        });
        tables.rsvps.insert(rsvp.id, rsvp.clone());

        if rsvp.is_confirmed() {
            *tables.daily.entry((day, rsvp.event.id.clone())).or_insert(0) += 1;
        }

        debug!(rsvp_id = rsvp.id, event_id = %rsvp.event.id, %day, "RSVP saved");
        Ok(())
    }

    async fn topk_events(&self, date: DateTime<Utc>, k: u32) -> Result<Vec<TopkEvent>> {
        let tables = self.tables.lock().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        let day = day_bucket(date);
        let mut counters: Vec<(&str, i64)> = tables
            .daily
            .iter()
            .filter(|((d, _), _)| *d == day)
            .map(|((_, event_id), confirmed)| (event_id.as_str(), *confirmed))
            .collect();
        counters.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let top = counters
            .into_iter()
            .take(k as usize)
            .filter_map(|(event_id, confirmed)| {
                let stored = tables.events.get(event_id)?;
                Some(TopkEvent { event: stored.event.clone(), confirmed_rsvps: confirmed })
            })
            .collect();

        Ok(top)
    }

    async fn get_event_info(&self, event_id: &str) -> Result<EventInfo> {
        let tables = self.tables.lock().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        let stored = tables.events.get(event_id).ok_or_else(|| StorageError::not_found(event_id))?;
        let group = tables.groups.get(&stored.group_id).ok_or_else(|| StorageError::not_found(event_id))?;
        let venue = tables.venues.get(&stored.venue_id).ok_or_else(|| StorageError::not_found(event_id))?;

        let confirmed = tables.daily.iter().filter(|((_, id), _)| id == event_id).map(|(_, count)| count).sum();

        Ok(EventInfo { group: group.clone(), venue: venue.clone(), confirmed_rsvps: Some(confirmed) })
    }

    async fn close(&self) {
        self.tables.lock().await.closed = true;
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
