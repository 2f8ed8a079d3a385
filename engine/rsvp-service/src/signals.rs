//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::service::ServiceState;

/// Resolve the returned receiver on Ctrl+C, or on SIGTERM under Unix
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Ctrl+C signal received"),
                Err(e) => {
                    error!("Failed to listen for Ctrl+C signal: {}", e);
                    return;
                }
            },
            _ = terminate => info!("SIGTERM signal received"),
        }

        let _ = shutdown_tx.send(());
    });

    Ok(shutdown_rx)
}

/// Graceful shutdown handler.
///
/// Stops intake first, then lets the workers drain their in-flight saves,
/// then waits for the named background tasks, and releases storage last.
pub async fn graceful_shutdown(service_state: Arc<ServiceState>, tasks: Vec<(&'static str, JoinHandle<()>)>) -> Result<()> {
    info!("Starting graceful shutdown...");
    let shutdown_timeout = service_state.config.service.shutdown_timeout();

    // Stop the feed and the HTTP servers
    service_state.request_shutdown();

    // Stop the ingestion workers
    if timeout(shutdown_timeout, service_state.stop_ingestion()).await.is_err() {
        warn!("Ingestion pool did not stop within timeout, forcing shutdown");
    } else {
        info!("Ingestion pool stopped gracefully");
    }

    for (name, handle) in tasks {
        match timeout(shutdown_timeout, handle).await {
            Ok(Ok(())) => {
                info!("{} stopped gracefully", name);
            }
            Ok(Err(e)) => {
                error!("{} task failed: {}", name, e);
            }
            Err(_) => {
                warn!("{} did not stop within timeout, forcing shutdown", name);
            }
        }
    }

    service_state.close_storage().await;

    info!("Graceful shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use event_cache::CacheBackend;
    use rsvp_core::CounterSink;
    use rsvp_ingest::PoolState;
    use rsvp_storage::StorageBackend;
    use std::time::Duration;

    async fn memory_state() -> Arc<ServiceState> {
        let mut config = ServiceConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.cache.backend = CacheBackend::Memory;
        config.service.shutdown_timeout_secs = 1;
        Arc::new(ServiceState::new(config, Arc::new(CounterSink::new())).await.unwrap())
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_tasks() {
        let state = memory_state().await;
        state.start_ingestion().await.unwrap();

        let token_state = Arc::clone(&state);
        let watcher = tokio::spawn(async move {
            while !token_state.is_shutting_down() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        graceful_shutdown(Arc::clone(&state), vec![("watcher", watcher)]).await.unwrap();

        assert!(state.is_shutting_down());
        assert_eq!(state.pool.state(), PoolState::Stopped);
        assert!(state.store.get_event_info("event_id1").await.is_err());
    }

    #[tokio::test]
    async fn test_stuck_task_does_not_block_shutdown() {
        let state = memory_state().await;
        let stuck = tokio::spawn(std::future::pending::<()>());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            graceful_shutdown(Arc::clone(&state), vec![("stuck", stuck)]),
        )
        .await;

        assert!(result.unwrap().is_ok());
    }
}
