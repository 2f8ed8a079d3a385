//! Request handlers

use chrono::NaiveDate;
use event_cache::{EventInfoReader, ReadError};
use rsvp_core::{day_start, EventInfo, TopkEvent};
use rsvp_storage::RsvpStore;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::error::ApiError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Top-k events of the UTC day given by `date`
pub async fn get_topk_events(
    params: HashMap<String, String>,
    store: Arc<dyn RsvpStore>,
    max_k: u32,
) -> Result<Response, Infallible> {
    Ok(reply_json(topk_events(&params, store.as_ref(), max_k).await))
}

/// Event info through the cache-aside reader
pub async fn get_event_info(
    params: HashMap<String, String>,
    reader: Arc<EventInfoReader>,
) -> Result<Response, Infallible> {
    Ok(reply_json(event_info(&params, &reader).await))
}

async fn topk_events(
    params: &HashMap<String, String>,
    store: &dyn RsvpStore,
    max_k: u32,
) -> Result<Vec<TopkEvent>, ApiError> {
    let date = parse_date(params)?;
    let k = parse_k(params, max_k)?;

    store.topk_events(day_start(date), k).await.map_err(|e| {
        error!(%date, k, error = %e, "Failed to load top events");
        ApiError::Internal
    })
}

async fn event_info(params: &HashMap<String, String>, reader: &EventInfoReader) -> Result<EventInfo, ApiError> {
    let event_id = params
        .get("event_id")
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing query parameter: event_id".to_string()))?;

    reader.get_event_info(event_id).await.map_err(|e| match e {
        ReadError::NotFound { event_id } => ApiError::NotFound {
            message: format!("Event with ID '{}' not found", event_id),
            details: Some(serde_json::json!({ "event_id": event_id })),
        },
        ReadError::Storage(e) => {
            error!(event_id, error = %e, "Failed to load event info");
            ApiError::Internal
        }
    })
}

fn parse_date(params: &HashMap<String, String>) -> Result<NaiveDate, ApiError> {
    let raw = params.get("date").ok_or_else(|| ApiError::BadRequest("missing query parameter: date".to_string()))?;

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ApiError::BadRequest(format!("invalid date {:?}, expected YYYY-MM-DD", raw)))
}

fn parse_k(params: &HashMap<String, String>, max_k: u32) -> Result<u32, ApiError> {
    let raw = params.get("k").ok_or_else(|| ApiError::BadRequest("missing query parameter: k".to_string()))?;

    let k: u32 =
        raw.parse().map_err(|_| ApiError::BadRequest(format!("invalid k {:?}, expected a non-negative integer", raw)))?;

    if k > max_k {
        return Err(ApiError::BadRequest(format!("k must not exceed {}", max_k)));
    }

    Ok(k)
}

fn reply_json<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(value) => warp::reply::json(&value).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Turn unmatched routes and rejected requests into JSON errors
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if rejection.is_not_found() {
        let error = ApiError::NotFound { message: "Route not found".to_string(), details: None };
        return Ok(error.into_response());
    }

    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        let body = ApiError::BadRequest("method not allowed".to_string()).to_body();
        return Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::METHOD_NOT_ALLOWED).into_response());
    }

    if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        return Ok(ApiError::BadRequest("malformed query string".to_string()).into_response());
    }

    error!(?rejection, "Unhandled rejection");
    Ok(ApiError::Internal.into_response())
}
