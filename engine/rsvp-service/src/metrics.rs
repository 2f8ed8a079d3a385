//! Prometheus bridge for the components' metrics sink

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rsvp_core::{Metric, MetricsSink, Timing};
use std::time::Duration;
use warp::Filter;

/// Forwards component metrics to the global `metrics` recorder
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSink;

impl PrometheusSink {
    /// Install the Prometheus recorder and describe every metric.
    ///
    /// Fails if a recorder is already installed in this process.
    pub fn install() -> Result<(Self, PrometheusHandle)> {
        let handle = PrometheusBuilder::new().install_recorder().context("Failed to install Prometheus recorder")?;

        for metric in Metric::ALL {
            metrics::describe_counter!(metric.name(), describe(metric));
        }
        metrics::describe_histogram!(Timing::RsvpSave.name(), metrics::Unit::Seconds, "Latency of one RSVP save");
        metrics::describe_histogram!(
            Timing::EventInfoLoad.name(),
            metrics::Unit::Seconds,
            "Latency of one event info load from storage"
        );

        Ok((Self, handle))
    }
}

fn describe(metric: Metric) -> &'static str {
    match metric {
        Metric::StreamMessages => "Payloads offered to the record queue",
        Metric::StreamInvalidMessages => "Payloads dropped as malformed",
        Metric::RsvpSaved => "RSVPs persisted",
        Metric::RsvpSaveFailed => "RSVP saves that failed",
        Metric::RsvpSaveTimeout => "RSVP saves that exceeded their deadline",
        Metric::CacheHit => "Event info reads answered by the cache",
        Metric::CacheMiss => "Event info reads missing the cache",
        Metric::CacheError => "Event info cache reads that failed",
        Metric::CacheSetFailed => "Event info cache writes that failed or timed out",
        Metric::EventInfoNotFound => "Event info reads for unknown events",
    }
}

impl MetricsSink for PrometheusSink {
    fn increment(&self, metric: Metric) {
        metrics::counter!(metric.name(), 1);
    }

    fn record_duration(&self, timing: Timing, elapsed: Duration) {
        metrics::histogram!(timing.name(), elapsed.as_secs_f64());
    }
}

/// `GET /metrics` in the Prometheus text format
pub fn metrics_routes(
    handle: PrometheusHandle,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("metrics").and(warp::path::end()).and(warp::get()).map(move || handle.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_route_serves_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let routes = metrics_routes(recorder.handle());

        let response = warp::test::request().method("GET").path("/metrics").reply(&routes).await;
        assert_eq!(response.status(), 200);

        let response = warp::test::request().method("GET").path("/metrics/extra").reply(&routes).await;
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_every_metric_is_described() {
        for metric in Metric::ALL {
            assert!(!describe(metric).is_empty());
        }
    }
}
