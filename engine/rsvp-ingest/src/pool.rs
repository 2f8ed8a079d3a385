//! Ingestion worker pool

use rsvp_core::{Metric, MetricsSink, Rsvp, Timing};
use rsvp_storage::RsvpStore;
use rsvp_stream::RsvpReceiver;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};

/// Lifecycle of a pool; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Created,
            1 => PoolState::Running,
            2 => PoolState::Stopping,
            _ => PoolState::Stopped,
        }
    }
}

/// Workers sharing one record queue and one storage engine
pub struct IngestionPool {
    store: Arc<dyn RsvpStore>,
    receiver: RsvpReceiver,
    metrics: Arc<dyn MetricsSink>,
    state: AtomicU8,
    cancel: CancellationToken,
    /// Flips to `true` once every worker has exited
    workers_done: Arc<watch::Sender<bool>>,
}

/// Everything one worker needs
struct Worker {
    id: usize,
    store: Arc<dyn RsvpStore>,
    receiver: RsvpReceiver,
    metrics: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
    save_timeout: Duration,
}

impl IngestionPool {
    pub fn new(store: Arc<dyn RsvpStore>, receiver: RsvpReceiver, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            store,
            receiver,
            metrics,
            state: AtomicU8::new(PoolState::Created as u8),
            cancel: CancellationToken::new(),
            workers_done: Arc::new(watch::channel(false).0),
        }
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Spawn `config.workers` workers. Only valid once, from `Created`.
    pub async fn start(&self, config: &IngestConfig) -> Result<()> {
        config.validate().map_err(IngestError::InvalidConfig)?;

        self.transition(PoolState::Created, PoolState::Running).map_err(IngestError::AlreadyStarted)?;

        let workers: Vec<_> = (0..config.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    store: Arc::clone(&self.store),
                    receiver: self.receiver.clone(),
                    metrics: Arc::clone(&self.metrics),
                    cancel: self.cancel.clone(),
                    save_timeout: config.save_timeout(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        tokio::spawn(supervise(workers, Arc::clone(&self.workers_done)));

        info!(
            workers = config.workers,
            save_timeout_ms = config.save_timeout_ms,
            backend = self.store.backend_name(),
            "Ingestion pool started"
        );
        Ok(())
    }

    /// Stop taking records and wait for every worker to finish its current
    /// save. Safe to call more than once and from several tasks; every call
    /// returns only after the workers are gone.
    pub async fn stop(&self) {
        loop {
            match self.transition(PoolState::Running, PoolState::Stopping) {
                Ok(()) => break,
                Err(PoolState::Created) => {
                    if self.transition(PoolState::Created, PoolState::Stopped).is_ok() {
                        self.workers_done.send_replace(true);
                        return;
                    }
                }
                Err(_) => {
                    self.wait_for_workers().await;
                    return;
                }
            }
        }

        info!("Stopping ingestion pool");
        self.cancel.cancel();
        self.wait_for_workers().await;

        self.state.store(PoolState::Stopped as u8, Ordering::Release);
        info!("Ingestion pool stopped");
    }

    /// Wait until the workers exit, either on their own after the queue
    /// closes and drains or because of a concurrent `stop`. Returns at once
    /// if the pool was never started.
    pub async fn join(&self) {
        if self.state() == PoolState::Created {
            return;
        }

        self.wait_for_workers().await;
        if self.transition(PoolState::Running, PoolState::Stopped).is_ok() {
            info!("Ingestion pool drained");
        }
    }

    async fn wait_for_workers(&self) {
        let mut done = self.workers_done.subscribe();
        // The sender lives in `self`, so this only ends once the flag is set
        let _ = done.wait_for(|finished| *finished).await;
    }

    fn transition(&self, from: PoolState, to: PoolState) -> std::result::Result<(), PoolState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PoolState::from_u8)
    }
}

/// Await every worker, then mark the pool's workers as done
async fn supervise(workers: Vec<JoinHandle<()>>, done: Arc<watch::Sender<bool>>) {
    for (id, handle) in workers.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!(worker_id = id, error = %e, "Ingestion worker terminated abnormally");
        }
    }
    done.send_replace(true);
}

impl Worker {
    async fn run(self) {
        debug!(worker_id = self.id, "Ingestion worker started");

        loop {
            let rsvp = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(rsvp) => rsvp,
                    None => break,
                },
            };

            // Not raced against `cancel`: an in-flight save ends on its own deadline
            self.save(&rsvp).await;
        }

        debug!(worker_id = self.id, "Ingestion worker exited");
    }

    async fn save(&self, rsvp: &Rsvp) {
        let started = Instant::now();

        match tokio::time::timeout(self.save_timeout, self.store.save_rsvp(rsvp)).await {
            Ok(Ok(())) => self.metrics.increment(Metric::RsvpSaved),
            Ok(Err(e)) => {
                self.metrics.increment(Metric::RsvpSaveFailed);
                error!(
                    worker_id = self.id,
                    rsvp_id = rsvp.id,
                    event_id = %rsvp.event.id,
                    error = %e,
                    "Failed to save RSVP"
                );
            }
            Err(_) => {
                self.metrics.increment(Metric::RsvpSaveTimeout);
                error!(
                    worker_id = self.id,
                    rsvp_id = rsvp.id,
                    event_id = %rsvp.event.id,
                    timeout_ms = self.save_timeout.as_millis() as u64,
                    "Timed out saving RSVP"
                );
            }
        }

        self.metrics.record_duration(Timing::RsvpSave, started.elapsed());
    }
}
