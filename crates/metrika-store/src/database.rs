//! RedbStore — redb-backed metric store.
//!
//! Each metric is one JSON record in the [`METRICS`] table. Every mutation
//! runs in its own write transaction, so counter read-modify-write is atomic
//! per key and readers see committed state only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrika_core::{Metric, MetricKind, MetricValue, Snapshot};
use redb::{Database, ReadableDatabase, ReadableTable, Table};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::mem::ensure_finite;
use crate::store::MetricStore;
use crate::tables::METRICS;

/// Thread-safe metric store backed by redb.
#[derive(Clone, Debug)]
pub struct RedbStore {
    db: Arc<Database>,
    path: Option<PathBuf>,
}

impl RedbStore {
    /// Open (or create) a database file. Any failure is reported as
    /// [`StoreError::Unavailable`].
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        let db = Database::create(path).map_err(map_err!(Unavailable))?;
        let store = Self {
            db: Arc::new(db),
            path: Some(path.to_path_buf()),
        };
        store.ensure_tables().map_err(map_err!(Unavailable))?;
        debug!(?path, "metric database opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Unavailable))?;
        let store = Self {
            db: Arc::new(db),
            path: None,
        };
        store.ensure_tables()?;
        debug!("in-memory metric database opened");
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(METRICS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` against the metrics table inside one write transaction.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let out = {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            f(&mut table)?
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(out)
    }
}

fn decode(bytes: &[u8]) -> StoreResult<Metric> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn encode(metric: &Metric) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(metric).map_err(map_err!(Serialize))
}

fn load(table: &Table<'_, &'static str, &'static [u8]>, id: &str) -> StoreResult<Option<Metric>> {
    match table.get(id).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn store(table: &mut Table<'_, &'static str, &'static [u8]>, metric: &Metric) -> StoreResult<()> {
    let value = encode(metric)?;
    table
        .insert(metric.id.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

impl MetricStore for RedbStore {
    fn backend(&self) -> &'static str {
        "redb"
    }

    fn set_gauge(&self, id: &str, value: f64) -> StoreResult<()> {
        ensure_finite(id, value)?;
        self.write(|table| {
            if let Some(existing) = load(table, id)? {
                if existing.kind() != MetricKind::Gauge {
                    return Err(StoreError::KindConflict {
                        id: id.to_string(),
                        existing: existing.kind(),
                        requested: MetricKind::Gauge,
                    });
                }
            }
            store(table, &Metric::gauge(id, value))
        })
    }

    fn add_counter(&self, id: &str, delta: i64) -> StoreResult<i64> {
        let total = self.write(|table| {
            let total = match load(table, id)? {
                None => delta,
                Some(Metric {
                    value: MetricValue::Counter(current),
                    ..
                }) => current.saturating_add(delta),
                Some(existing) => {
                    return Err(StoreError::KindConflict {
                        id: id.to_string(),
                        existing: existing.kind(),
                        requested: MetricKind::Counter,
                    });
                }
            };
            store(table, &Metric::counter(id, total))?;
            Ok(total)
        })?;
        debug!(%id, total, "counter updated");
        Ok(total)
    }

    fn get(&self, id: &str) -> StoreResult<Option<Metric>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(METRICS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn snapshot(&self) -> StoreResult<Snapshot> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(METRICS).map_err(map_err!(Table))?;
        let mut metrics = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            metrics.push(decode(value.value())?);
        }
        Ok(metrics.into_iter().collect())
    }

    fn replace(&self, snapshot: Snapshot) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.delete_table(METRICS).map_err(map_err!(Table))?;
        let count = snapshot.len();
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            for metric in snapshot.iter() {
                store(&mut table, metric)?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count, "metric database replaced");
        Ok(())
    }

    fn health_check(&self) -> StoreResult<()> {
        let txn = self.db.begin_read().map_err(map_err!(Unavailable))?;
        txn.open_table(METRICS).map_err(map_err!(Unavailable))?;
        Ok(())
    }
}
