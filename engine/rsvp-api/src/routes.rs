//! Route table

use event_cache::EventInfoReader;
use rsvp_storage::RsvpStore;
use std::collections::HashMap;
use std::sync::Arc;
use warp::Filter;

use crate::config::ApiConfig;
use crate::handlers;

/// Create REST API routes
pub fn create_routes(
    store: Arc<dyn RsvpStore>,
    reader: Arc<EventInfoReader>,
    config: &ApiConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    let max_k = config.max_k;
    let store_filter = warp::any().map(move || store.clone());
    let reader_filter = warp::any().map(move || reader.clone());
    let max_k_filter = warp::any().map(move || max_k);

    // Top-k events endpoint
    let topk = warp::path!("api" / "v1" / "events" / "topk")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(store_filter)
        .and(max_k_filter)
        .and_then(handlers::get_topk_events);

    // Event info endpoint
    let info = warp::path!("api" / "v1" / "events" / "info")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(reader_filter)
        .and_then(handlers::get_event_info);

    // Health check endpoint
    let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    });

    topk.or(info).or(health).recover(handlers::handle_rejection)
}
