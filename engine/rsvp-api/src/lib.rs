//! # RSVP API
//!
//! Read-only HTTP surface:
//!
//! - `GET /api/v1/events/topk?date=YYYY-MM-DD&k=N` - most confirmed events of a UTC day
//! - `GET /api/v1/events/info?event_id=ID` - group and venue of an event, cache-aside
//! - `GET /health` - liveness

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use config::ApiConfig;
pub use error::{ApiError, ErrorDetail, ErrorResponse};
pub use routes::create_routes;
