//! Bounded single-producer, multi-consumer record queue

use rsvp_core::{Metric, MetricsSink, Rsvp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::{Result, StreamError};

/// Message counters of one stream
#[derive(Debug, Default)]
pub struct StreamStats {
    total: AtomicU64,
    invalid: AtomicU64,
}

impl StreamStats {
    /// Payloads offered to the queue, valid or not
    pub fn total_messages(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Payloads dropped because they could not be decoded
    pub fn invalid_messages(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }
}

/// Producer half of the record queue
#[derive(Clone)]
pub struct RsvpSender {
    tx: mpsc::Sender<Rsvp>,
    stats: Arc<StreamStats>,
    metrics: Arc<dyn MetricsSink>,
}

/// Consumer half of the record queue.
///
/// Clones share one underlying receiver, so each record is handed to
/// exactly one of them.
#[derive(Clone)]
pub struct RsvpReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Rsvp>>>,
}

/// Create a queue holding at most `capacity` undelivered records
pub fn channel(capacity: usize, metrics: Arc<dyn MetricsSink>) -> (RsvpSender, RsvpReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = RsvpSender { tx, stats: Arc::new(StreamStats::default()), metrics };
    let receiver = RsvpReceiver { rx: Arc::new(Mutex::new(rx)) };
    (sender, receiver)
}

impl RsvpSender {
    /// Enqueue a decoded record, waiting while the queue is full
    pub async fn send(&self, rsvp: Rsvp) -> Result<()> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(Metric::StreamMessages);
        self.tx.send(rsvp).await.map_err(|_| StreamError::Closed)
    }

    /// Decode a raw payload and enqueue it.
    ///
    /// Returns `Ok(false)` when the payload was malformed and dropped.
    pub async fn send_payload(&self, payload: &[u8]) -> Result<bool> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(Metric::StreamMessages);

        let rsvp = match Rsvp::from_payload(payload) {
            Ok(rsvp) => rsvp,
            Err(e) => {
                self.stats.invalid.fetch_add(1, Ordering::Relaxed);
                self.metrics.increment(Metric::StreamInvalidMessages);
                warn!(error = %e, "Dropping malformed RSVP payload");
                return Ok(false);
            }
        };

        self.tx.send(rsvp).await.map_err(|_| StreamError::Closed)?;
        Ok(true)
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl RsvpReceiver {
    /// Next record, or `None` once every sender is gone and the queue is drained
    pub async fn recv(&self) -> Option<Rsvp> {
        self.rx.lock().await.recv().await
    }
}
