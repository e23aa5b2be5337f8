//! In-memory store.

use std::collections::HashMap;

use metrika_core::{Metric, MetricKind, MetricValue, Snapshot};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::MetricStore;

/// `HashMap` behind one reader-writer lock.
///
/// Mutations hold the write lock for a single map operation; reads and
/// snapshots share the read lock.
#[derive(Default)]
pub struct MemStore {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

fn conflict(id: &str, existing: MetricKind, requested: MetricKind) -> StoreError {
    StoreError::KindConflict {
        id: id.to_string(),
        existing,
        requested,
    }
}

pub(crate) fn ensure_finite(id: &str, value: f64) -> StoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::NonFinite {
            id: id.to_string(),
            value,
        })
    }
}

impl MetricStore for MemStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn set_gauge(&self, id: &str, value: f64) -> StoreResult<()> {
        ensure_finite(id, value)?;
        let mut metrics = self.metrics.write();
        match metrics.get_mut(id) {
            Some(existing) if existing.kind() != MetricKind::Gauge => {
                Err(conflict(id, existing.kind(), MetricKind::Gauge))
            }
            Some(existing) => {
                existing.value = MetricValue::Gauge(value);
                Ok(())
            }
            None => {
                metrics.insert(id.to_string(), Metric::gauge(id, value));
                Ok(())
            }
        }
    }

    fn add_counter(&self, id: &str, delta: i64) -> StoreResult<i64> {
        let mut metrics = self.metrics.write();
        match metrics.get_mut(id) {
            Some(Metric {
                value: MetricValue::Counter(total),
                ..
            }) => {
                *total = total.saturating_add(delta);
                Ok(*total)
            }
            Some(existing) => Err(conflict(id, existing.kind(), MetricKind::Counter)),
            None => {
                metrics.insert(id.to_string(), Metric::counter(id, delta));
                Ok(delta)
            }
        }
    }

    fn get(&self, id: &str) -> StoreResult<Option<Metric>> {
        Ok(self.metrics.read().get(id).cloned())
    }

    fn snapshot(&self) -> StoreResult<Snapshot> {
        Ok(self.metrics.read().values().cloned().collect())
    }

    fn replace(&self, snapshot: Snapshot) -> StoreResult<()> {
        let fresh: HashMap<String, Metric> = snapshot
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        *self.metrics.write() = fresh;
        Ok(())
    }
}
