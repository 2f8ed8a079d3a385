//! RSVP wire model and derived read models
//!
//! The field names follow the upstream RSVP feed. Timestamps travel as epoch
//! milliseconds and are converted to UTC only at the edges that need them.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::day::day_bucket;
use crate::error::{CoreError, Result};
use crate::CONFIRMED_RESPONSE;

/// One member's response to an event invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rsvp {
    #[serde(rename = "rsvp_id")]
    pub id: i64,
    /// Mutation time, epoch milliseconds
    pub mtime: i64,
    #[serde(default)]
    pub guests: u32,
    #[serde(default)]
    pub visibility: String,
    pub response: String,

    pub venue: Venue,
    pub member: Member,
    pub event: Event,
    pub group: Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(rename = "venue_id")]
    pub id: i64,
    #[serde(rename = "venue_name", default)]
    pub name: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "member_id")]
    pub id: i64,
    #[serde(rename = "member_name", default)]
    pub name: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event_id")]
    pub id: String,
    #[serde(rename = "event_name", default)]
    pub name: String,
    #[serde(rename = "event_url", default)]
    pub url: String,
    /// Scheduled start, epoch milliseconds
    #[serde(default)]
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "group_id")]
    pub id: i64,
    #[serde(rename = "group_name", default)]
    pub name: String,
    #[serde(rename = "group_country", default)]
    pub country: String,
    /// Empty when the feed carries no state; persisted as NULL
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(rename = "group_lat", default)]
    pub lat: f64,
    #[serde(rename = "group_lon", default)]
    pub lon: f64,
    #[serde(rename = "group_urlname", default)]
    pub urlname: String,
    #[serde(default)]
    pub topics: Vec<GroupTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTopic {
    pub urlkey: String,
    pub topic_name: String,
}

/// Group and venue of an event, assembled by the storage join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub group: Group,
    pub venue: Venue,
    /// Confirmed RSVPs across all days at the time the info was loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_rsvps: Option<i64>,
}

/// One entry of a per-day popularity ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopkEvent {
    pub event: Event,
    pub confirmed_rsvps: i64,
}

impl Rsvp {
    /// Decode a raw feed payload.
    ///
    /// Rejects payloads whose timestamps cannot be represented in UTC, so
    /// every decoded record can be bucketed without further checks.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let rsvp: Rsvp = serde_json::from_slice(payload)?;
        rsvp.mtime_utc()?;
        rsvp.event.time_utc()?;
        Ok(rsvp)
    }

    /// Whether this response counts towards the daily popularity counter
    pub fn is_confirmed(&self) -> bool {
        self.response == CONFIRMED_RESPONSE
    }

    pub fn mtime_utc(&self) -> Result<DateTime<Utc>> {
        millis_to_utc("mtime", self.mtime)
    }

    /// UTC day of the mutation time; the counter bucket for this RSVP
    pub fn day(&self) -> Result<NaiveDate> {
        self.mtime_utc().map(day_bucket)
    }
}

impl Event {
    pub fn time_utc(&self) -> Result<DateTime<Utc>> {
        millis_to_utc("event.time", self.time)
    }
}

impl Group {
    pub fn state_opt(&self) -> Option<&str> {
        if self.state.is_empty() {
            None
        } else {
            Some(self.state.as_str())
        }
    }
}

fn millis_to_utc(field: &'static str, value: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value).single().ok_or(CoreError::InvalidTimestamp { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const PAYLOAD: &str = r#"{
        "rsvp_id": 1001,
        "mtime": 1677933050000,
        "guests": 1,
        "visibility": "public",
        "response": "yes",
        "venue": {"venue_id": 2001, "venue_name": "venue_name1", "lat": 21.0, "lon": 22.0},
        "member": {"member_id": 3001, "member_name": "member_name1", "photo": "member_photo1"},
        "event": {"event_id": "event_id1", "event_name": "event_name1", "event_url": "event_url1", "time": 1678000000000},
        "group": {
            "group_id": 5001,
            "group_name": "group_name1",
            "group_country": "us",
            "city": "group_city1",
            "group_lat": 51.0,
            "group_lon": 52.0,
            "group_urlname": "group_urlname1",
            "topics": [{"urlkey": "rust", "topic_name": "Rust"}]
        }
    }"#;

    #[test]
    fn test_decode_payload() {
        let rsvp = Rsvp::from_payload(PAYLOAD.as_bytes()).unwrap();

        assert_eq!(rsvp.id, 1001);
        assert!(rsvp.is_confirmed());
        assert_eq!(rsvp.venue.name, "venue_name1");
        assert_eq!(rsvp.event.id, "event_id1");
        assert_eq!(rsvp.group.state, "");
        assert_eq!(rsvp.group.state_opt(), None);
        assert_eq!(rsvp.group.topics.len(), 1);

        let day = rsvp.day().unwrap();
        assert_eq!((day.year(), day.month(), day.day()), (2023, 3, 4));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Rsvp::from_payload(b"not json"), Err(CoreError::Decode(_))));
        assert!(matches!(Rsvp::from_payload(br#"{"rsvp_id": 1}"#), Err(CoreError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_out_of_range_mtime() {
        let payload = PAYLOAD.replace("1677933050000", &i64::MAX.to_string());
        let err = Rsvp::from_payload(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp { field: "mtime", .. }));
    }

    #[test]
    fn test_only_yes_is_confirmed() {
        let mut rsvp = Rsvp::from_payload(PAYLOAD.as_bytes()).unwrap();
        for response in ["no", "waitlist", "YES", ""] {
            rsvp.response = response.to_string();
            assert!(!rsvp.is_confirmed(), "{response:?} must not be confirmed");
        }
    }

    #[test]
    fn test_event_info_omits_missing_count() {
        let rsvp = Rsvp::from_payload(PAYLOAD.as_bytes()).unwrap();
        let info = EventInfo { group: rsvp.group, venue: rsvp.venue, confirmed_rsvps: None };

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("confirmed_rsvps").is_none());
        assert_eq!(json["venue"]["venue_id"], 2001);
    }
}
