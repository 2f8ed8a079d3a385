//! RSVP Service Library
//!
//! Process bootstrap for the RSVP ingestion system: configuration loading,
//! logging, the Prometheus bridge, component wiring and graceful shutdown.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod signals;

pub use crate::config::ServiceConfig;
pub use crate::metrics::PrometheusSink;
pub use logging::initialize_logging;
pub use service::ServiceState;
pub use signals::{graceful_shutdown, setup_signal_handlers};

/// Load configuration from an optional file and the environment
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    crate::config::load_config(path).context("Failed to load service configuration")
}
