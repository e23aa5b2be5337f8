//! Dispatcher — snapshots the agent store on the report interval and offers
//! each snapshot to the delivery queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrika_store::MetricStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::pool::{BatchQueue, SubmitError};

/// What one dispatch tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Submitted { metrics: usize },
    /// Nothing to report yet, or the snapshot failed.
    Skipped,
    /// Every worker busy and the queue full.
    Dropped,
    Closed,
}

pub struct Dispatcher {
    store: Arc<dyn MetricStore>,
    queue: BatchQueue,
    interval: Duration,
    dropped: AtomicU64,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MetricStore>, queue: BatchQueue, interval: Duration) -> Self {
        Self {
            store,
            queue,
            interval,
            dropped: AtomicU64::new(0),
        }
    }

    /// Batches lost to backpressure so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn dispatch_once(&self) -> Dispatch {
        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot failed, skipping report");
                return Dispatch::Skipped;
            }
        };
        if snapshot.is_empty() {
            return Dispatch::Skipped;
        }

        let metrics = snapshot.len();
        match self.queue.try_submit(snapshot) {
            Ok(()) => {
                debug!(metrics, "batch queued");
                Dispatch::Submitted { metrics }
            }
            Err(SubmitError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(metrics, dropped, "delivery queue full, batch dropped");
                Dispatch::Dropped
            }
            Err(SubmitError::Closed(_)) => Dispatch::Closed,
        }
    }

    /// Run the report loop until shutdown signal or until the queue closes.
    /// The queue handle is released on return.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(interval_secs = self.interval.as_secs(), "dispatcher started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if self.dispatch_once() == Dispatch::Closed {
                        warn!("delivery queue closed, dispatcher stopping");
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    info!("dispatcher shutting down");
                    break;
                }
            }
        }

        self.dropped()
    }
}
