//! The `MetricStore` trait shared by every backend.

use metrika_core::{Metric, MetricValue, Snapshot};

use crate::error::{ApplyError, StoreResult};

/// Concurrent keyed store of gauges and counters.
///
/// Every mutation is atomic per key: a concurrent [`snapshot`](Self::snapshot)
/// sees either the state before it or after it, never a partial update.
/// The kind of an id is fixed by its first write; updating it as the other
/// kind fails with [`StoreError::KindConflict`](crate::StoreError::KindConflict)
/// and leaves the stored metric untouched.
pub trait MetricStore: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Overwrite a gauge (last write wins). NaN and infinities are refused
    /// with [`StoreError::NonFinite`](crate::StoreError::NonFinite).
    fn set_gauge(&self, id: &str, value: f64) -> StoreResult<()>;

    /// Add `delta` to a counter, starting from 0 when absent. Saturates at
    /// the `i64` bounds. Returns the new total.
    fn add_counter(&self, id: &str, delta: i64) -> StoreResult<i64>;

    fn get(&self, id: &str) -> StoreResult<Option<Metric>>;

    /// Full point-in-time copy, ordered by id.
    fn snapshot(&self) -> StoreResult<Snapshot>;

    /// Discard all contents and load `snapshot` instead.
    fn replace(&self, snapshot: Snapshot) -> StoreResult<()>;

    fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Apply one incoming record: gauges are set, counters are added.
    ///
    /// Returns the metric as stored afterwards (for counters, the new total).
    fn apply(&self, metric: &Metric) -> StoreResult<Metric> {
        match metric.value {
            MetricValue::Gauge(value) => {
                self.set_gauge(&metric.id, value)?;
                Ok(metric.clone())
            }
            MetricValue::Counter(delta) => {
                let total = self.add_counter(&metric.id, delta)?;
                Ok(Metric::counter(metric.id.clone(), total))
            }
        }
    }

    /// Apply records in order, stopping at the first failure.
    fn apply_all(&self, metrics: &[Metric]) -> Result<usize, ApplyError> {
        for (applied, metric) in metrics.iter().enumerate() {
            self.apply(metric)
                .map_err(|source| ApplyError { applied, source })?;
        }
        Ok(metrics.len())
    }
}
