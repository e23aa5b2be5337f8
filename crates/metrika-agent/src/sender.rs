//! Batch delivery with bounded retry.
//!
//! A batch is sealed once and then sent up to [`RetryPolicy::max_attempts`]
//! times. Each attempt is bounded by [`RetryPolicy::attempt_timeout`]; a
//! transport error, timeout, or non-success status counts as a failure.
//! After every failed attempt, the last one included, the sender sleeps for
//! the matching entry of [`RetryPolicy::delays`]; with the default policy a
//! hopeless batch ties up its worker for 1 + 3 + 5 seconds plus the attempts
//! themselves. Then the batch is abandoned; it is never re-queued.

use std::sync::Arc;
use std::time::Duration;

use metrika_core::Snapshot;
use metrika_transport::{Sealer, Transport, TransportError};
use tracing::{debug, warn};

/// Attempt count, backoff delays, and per-attempt timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Delay after failed attempt `n` is `delays[n - 1]` (the last entry
    /// repeats if there are more attempts than delays).
    pub delays: Vec<Duration>,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: usize) -> Duration {
        self.delays
            .get(attempt.saturating_sub(1))
            .or(self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Result of delivering one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: usize },
    Abandoned { attempts: usize },
}

/// Seals snapshots and pushes them through a [`Transport`].
pub struct BatchSender {
    transport: Arc<dyn Transport>,
    sealer: Sealer,
    policy: RetryPolicy,
}

impl BatchSender {
    pub fn new(transport: Arc<dyn Transport>, sealer: Sealer) -> Self {
        Self {
            transport,
            sealer,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn deliver(&self, snapshot: &Snapshot) -> DeliveryOutcome {
        let envelope = match self.sealer.seal(snapshot) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, metrics = snapshot.len(), "batch could not be sealed, dropping");
                return DeliveryOutcome::Abandoned { attempts: 0 };
            }
        };

        let transport = self.transport.name();
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let result =
                match tokio::time::timeout(self.policy.attempt_timeout, self.transport.send(&envelope))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(self.policy.attempt_timeout)),
                };

            match result {
                Ok(()) => {
                    debug!(transport, attempt, metrics = snapshot.len(), "batch delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    debug!(transport, attempt, error = %e, ?delay, "delivery attempt failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(
            transport,
            attempts = max_attempts,
            metrics = snapshot.len(),
            "delivery failed, batch abandoned"
        );
        DeliveryOutcome::Abandoned {
            attempts: max_attempts,
        }
    }
}
