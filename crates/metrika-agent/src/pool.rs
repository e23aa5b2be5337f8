//! Delivery worker pool.
//!
//! A bounded queue (capacity = worker count) feeds `workers` tasks that share
//! one receiver. Submission never blocks: when every worker is busy and the
//! queue is full, the batch comes straight back as [`SubmitError::Full`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrika_core::Snapshot;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sender::{BatchSender, DeliveryOutcome};

/// A rejected submission; the batch is handed back.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("delivery queue is full")]
    Full(Snapshot),

    #[error("delivery queue is closed")]
    Closed(Snapshot),
}

/// Producer handle onto the pool's queue.
#[derive(Clone)]
pub struct BatchQueue {
    tx: mpsc::Sender<Snapshot>,
}

impl BatchQueue {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::Sender<Snapshot>) -> Self {
        Self { tx }
    }

    /// Offer a batch without waiting.
    pub fn try_submit(&self, batch: Snapshot) -> Result<(), SubmitError> {
        self.tx.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(batch) => SubmitError::Full(batch),
            mpsc::error::TrySendError::Closed(batch) => SubmitError::Closed(batch),
        })
    }
}

/// Delivery counters across all workers.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    abandoned: AtomicU64,
}

impl DeliveryStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }
}

pub struct WorkerPool {
    tx: mpsc::Sender<Snapshot>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<DeliveryStats>,
}

impl WorkerPool {
    /// Start `workers` delivery tasks (at least one).
    pub fn spawn(workers: usize, sender: Arc<BatchSender>) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel(workers);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DeliveryStats::default());

        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    rx.clone(),
                    sender.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(workers, "delivery workers started");
        Self {
            tx,
            workers: handles,
            stats,
        }
    }

    pub fn queue(&self) -> BatchQueue {
        BatchQueue {
            tx: self.tx.clone(),
        }
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        self.stats.clone()
    }

    /// Close the queue and wait for every worker to finish.
    ///
    /// Workers complete the batches already queued, including their retry
    /// cycles. Outstanding [`BatchQueue`] handles keep the queue open, so
    /// producers must be stopped first.
    pub async fn shutdown(self) {
        let Self { tx, workers, .. } = self;
        drop(tx);
        for handle in workers {
            let _ = handle.await;
        }
        info!("delivery workers stopped");
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<Snapshot>>>,
    sender: Arc<BatchSender>,
    stats: Arc<DeliveryStats>,
) {
    loop {
        let batch = rx.lock().await.recv().await;
        let Some(batch) = batch else {
            debug!(worker, "queue closed, worker exiting");
            break;
        };
        match sender.deliver(&batch).await {
            DeliveryOutcome::Delivered { .. } => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Abandoned { .. } => {
                stats.abandoned.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    use metrika_core::Metric;
    use metrika_transport::{Capabilities, Envelope, Sealer, Transport, TransportFuture};
    use tokio::sync::Semaphore;

    use crate::sender::tests::FlakyTransport;

    /// Blocks every send until a permit is released.
    struct Gated {
        gate: Semaphore,
        started: tokio::sync::Notify,
    }

    impl Transport for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn probe(&self) -> Pin<Box<dyn Future<Output = Capabilities> + Send + '_>> {
            Box::pin(async { Capabilities::default() })
        }

        fn send<'a>(&'a self, _envelope: &'a Envelope) -> TransportFuture<'a, ()> {
            Box::pin(async move {
                self.started.notify_one();
                let permit = self.gate.acquire().await;
                drop(permit);
                Ok(())
            })
        }
    }

    fn batch(n: i64) -> Snapshot {
        vec![Metric::counter("PollCount", n)].into_iter().collect()
    }

    #[tokio::test]
    async fn excess_submissions_fail_immediately() {
        let transport = Arc::new(Gated {
            gate: Semaphore::new(0),
            started: tokio::sync::Notify::new(),
        });
        let sender = Arc::new(BatchSender::new(transport.clone(), Sealer::default()));
        let pool = WorkerPool::spawn(1, sender);
        let queue = pool.queue();

        // First batch is picked up by the only worker and blocks in send.
        queue.try_submit(batch(1)).unwrap();
        transport.started.notified().await;

        // Second fills the queue; third is refused at once.
        queue.try_submit(batch(2)).unwrap();
        assert!(matches!(queue.try_submit(batch(3)), Err(SubmitError::Full(_))));

        transport.gate.add_permits(10);
        drop(queue);
        let stats = pool.stats();
        pool.shutdown().await;
        assert_eq!(stats.delivered(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_queued_batches_through_retry() {
        let transport = Arc::new(FlakyTransport::new(usize::MAX));
        let sender = Arc::new(BatchSender::new(transport.clone(), Sealer::default()));
        let pool = WorkerPool::spawn(2, sender);
        let queue = pool.queue();
        queue.try_submit(batch(1)).unwrap();
        queue.try_submit(batch(2)).unwrap();
        drop(queue);

        let stats = pool.stats();
        pool.shutdown().await;
        assert_eq!(stats.abandoned(), 2);
        assert_eq!(transport.calls(), 6);
    }

    #[test]
    fn submit_without_receiver_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let queue = BatchQueue { tx };
        assert!(matches!(queue.try_submit(batch(1)), Err(SubmitError::Closed(_))));
    }
}
