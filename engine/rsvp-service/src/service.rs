//! Service state management and component initialization

use anyhow::{anyhow, Context, Result};
use event_cache::EventInfoReader;
use metrics_exporter_prometheus::PrometheusHandle;
use rsvp_core::MetricsSink;
use rsvp_ingest::IngestionPool;
use rsvp_storage::RsvpStore;
use rsvp_stream::{JsonlFeed, RsvpSender};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::metrics::metrics_routes;

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Storage engine shared by the pool and the read surface
    pub store: Arc<dyn RsvpStore>,

    /// Cache-aside event info reader
    pub reader: Arc<EventInfoReader>,

    /// Ingestion worker pool
    pub pool: Arc<IngestionPool>,

    /// Producer half of the record queue, handed to the feed on start
    sender: Mutex<Option<RsvpSender>>,

    /// Cancelled once shutdown begins; stops the feed and the servers
    shutdown: CancellationToken,
}

impl ServiceState {
    /// Connect to storage and cache and wire the components together.
    ///
    /// Fails if either backend is unreachable.
    pub async fn new(config: ServiceConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        info!("Initializing service components...");

        info!(backend = ?config.storage.backend, "Initializing storage engine...");
        let store = rsvp_storage::connect(&config.storage).await.context("Failed to initialize storage engine")?;

        info!(backend = ?config.cache.backend, "Initializing event info cache...");
        let cache = event_cache::connect(&config.cache).await.context("Failed to initialize event info cache")?;

        let reader = Arc::new(EventInfoReader::new(cache, Arc::clone(&store), Arc::clone(&metrics), &config.cache));

        let (sender, receiver) = rsvp_stream::channel(config.stream.queue_capacity, Arc::clone(&metrics));
        let pool = Arc::new(IngestionPool::new(Arc::clone(&store), receiver, metrics));

        Ok(Self {
            config,
            store,
            reader,
            pool,
            sender: Mutex::new(Some(sender)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the ingestion workers
    pub async fn start_ingestion(&self) -> Result<()> {
        self.pool.start(&self.config.ingest).await.context("Failed to start ingestion pool")
    }

    /// Start pushing the configured JSONL feed into the record queue
    pub async fn spawn_feed(&self) -> Result<JoinHandle<()>> {
        let sender = self.sender.lock().await.take().ok_or_else(|| anyhow!("RSVP feed already started"))?;
        let cancel = self.shutdown.clone();

        let handle = match &self.config.stream.feed_path {
            Some(path) => {
                let feed = JsonlFeed::open(path, sender)
                    .await
                    .with_context(|| format!("Failed to open RSVP feed {}", path.display()))?;
                tokio::spawn(run_feed(feed, cancel))
            }
            None => {
                info!("Reading RSVP feed from standard input");
                let feed = JsonlFeed::new(BufReader::new(tokio::io::stdin()), sender);
                tokio::spawn(run_feed(feed, cancel))
            }
        };

        Ok(handle)
    }

    /// Bind the read API; it stops accepting requests once shutdown begins
    pub fn spawn_api(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.api.socket_addr().map_err(anyhow::Error::msg)?;
        let routes = rsvp_api::create_routes(Arc::clone(&self.store), Arc::clone(&self.reader), &self.config.api);
        let shutdown = self.shutdown.clone();

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async move { shutdown.cancelled().await })
            .context("Failed to bind API server")?;

        info!(address = %bound, "API server listening");
        Ok((bound, tokio::spawn(server)))
    }

    /// Bind the Prometheus scrape endpoint
    pub fn spawn_metrics(&self, handle: PrometheusHandle) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.metrics.socket_addr()?;
        let shutdown = self.shutdown.clone();

        let (bound, server) = warp::serve(metrics_routes(handle))
            .try_bind_with_graceful_shutdown(addr, async move { shutdown.cancelled().await })
            .context("Failed to bind metrics server")?;

        info!(address = %bound, "Metrics server listening");
        Ok((bound, tokio::spawn(server)))
    }

    /// Signal the feed and servers to stop
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the workers, waiting for in-flight saves
    pub async fn stop_ingestion(&self) {
        self.pool.stop().await;
    }

    /// Release the storage engine
    pub async fn close_storage(&self) {
        self.store.close().await;
        info!("Storage engine closed");
    }
}

async fn run_feed<R>(feed: JsonlFeed<R>, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin + Send,
{
    match feed.run(cancel).await {
        Ok(forwarded) => info!(forwarded, "RSVP feed finished"),
        Err(e) => error!(error = %e, "RSVP feed failed"),
    }
}
