//! # RSVP Stream
//!
//! The inbound side of ingestion: a bounded queue fed by one producer and
//! drained by many workers, plus a newline-delimited JSON feed that turns raw
//! payloads into typed records.
//!
//! Malformed payloads are counted and dropped at the producer; only decoded
//! records ever reach a worker. Delivery is at-least-once, so the same RSVP
//! may arrive more than once.

pub mod channel;
pub mod config;
pub mod error;
pub mod feed;

pub use channel::{channel, RsvpReceiver, RsvpSender, StreamStats};
pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use feed::JsonlFeed;
