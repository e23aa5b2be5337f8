//! Poller — samples every collector into the agent's store on a fixed
//! interval.

use std::sync::Arc;
use std::time::Duration;

use metrika_store::MetricStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::collector::Collector;

pub struct Poller {
    store: Arc<dyn MetricStore>,
    collectors: Vec<Box<dyn Collector>>,
    interval: Duration,
}

impl Poller {
    pub fn new(store: Arc<dyn MetricStore>, interval: Duration) -> Self {
        Self {
            store,
            collectors: Vec::new(),
            interval,
        }
    }

    pub fn with_collector(mut self, collector: impl Collector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    /// Run every collector once and apply the results. A failing collector
    /// is logged and skipped. Returns the number of records applied.
    pub fn poll_once(&mut self) -> usize {
        let mut applied = 0;
        for collector in &mut self.collectors {
            let metrics = match collector.collect() {
                Ok(metrics) => metrics,
                Err(e) => {
                    warn!(collector = collector.name(), error = %e, "collector failed");
                    continue;
                }
            };
            for metric in &metrics {
                match self.store.apply(metric) {
                    Ok(_) => applied += 1,
                    Err(e) => warn!(id = %metric.id, error = %e, "metric update rejected"),
                }
            }
        }
        debug!(applied, "poll complete");
        applied
    }

    /// Run the poll loop until shutdown signal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            collectors = self.collectors.len(),
            "poller started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.poll_once();
                }
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }
        }
    }
}
