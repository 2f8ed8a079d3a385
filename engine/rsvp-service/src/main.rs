//! RSVP Ingestion Service
//!
//! Main entry point: loads configuration, wires the storage engine, cache,
//! ingestion pool and read API together, and shuts them down in order on
//! Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use rsvp_core::{MetricsSink, NoopSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use rsvp_service::{
    graceful_shutdown, initialize_logging, load_configuration, setup_signal_handlers, PrometheusSink, ServiceState,
};

#[derive(Debug, Parser)]
#[command(name = "rsvp-service", version, about = "RSVP ingestion and popularity service")]
struct Cli {
    /// TOML configuration file; environment variables prefixed RSVP__ override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(cli.config.as_deref())?;
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    initialize_logging(&config.logging)?;
    info!("Starting RSVP Service v{}", env!("CARGO_PKG_VERSION"));

    let mut prometheus = None;
    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        let (sink, handle) = PrometheusSink::install()?;
        prometheus = Some(handle);
        Arc::new(sink)
    } else {
        Arc::new(NoopSink)
    };

    // Create service state
    let service_state = Arc::new(ServiceState::new(config, metrics).await.context("Failed to initialize service")?);
    info!("Service state initialized");

    // Setup signal handlers for graceful shutdown
    let shutdown_signal = setup_signal_handlers()?;
    info!("Signal handlers configured");

    info!(workers = service_state.config.ingest.workers, "Starting ingestion pool...");
    service_state.start_ingestion().await?;

    let mut tasks = Vec::new();
    tasks.push(("RSVP feed", service_state.spawn_feed().await?));

    let (_, api_handle) = service_state.spawn_api()?;
    tasks.push(("API server", api_handle));

    if let Some(handle) = prometheus {
        let (_, metrics_handle) = service_state.spawn_metrics(handle)?;
        tasks.push(("Metrics server", metrics_handle));
    }

    // Wait for shutdown signal
    info!("RSVP Service is running. Press Ctrl+C to shutdown gracefully.");
    let _ = shutdown_signal.await;

    info!("Shutdown signal received. Initiating graceful shutdown...");
    graceful_shutdown(service_state, tasks).await?;

    info!("RSVP Service shutdown complete");
    Ok(())
}
