//! Snapshot persistence for the file-backed store.
//!
//! The whole store is written as one JSON object `{id: record}`. Each save
//! truncates and rewrites the file; a crash mid-write can leave it partial,
//! which restore treats like an empty file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use metrika_core::Snapshot;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::MetricStore;

/// Settings for [`SnapshotPersister::enable`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistConfig {
    pub path: PathBuf,
    /// Time between saves. Zero is replaced by one second.
    pub interval: Duration,
    /// Load the file into the store before the first save.
    pub restore: bool,
}

/// Periodically writes a store's snapshot to a JSON file.
pub struct SnapshotPersister {
    store: Arc<dyn MetricStore>,
    path: PathBuf,
    interval: Duration,
}

impl SnapshotPersister {
    /// Prepare the backing file (creating it and its parent directories) and
    /// optionally restore its contents into `store`.
    ///
    /// An empty or unreadable file does not fail restore: the store simply
    /// starts empty.
    pub fn enable(store: Arc<dyn MetricStore>, config: PersistConfig) -> StoreResult<Self> {
        let PersistConfig {
            path,
            interval,
            restore,
        } = config;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let interval = if interval.is_zero() {
            warn!("store interval of zero replaced by 1s");
            Duration::from_secs(1)
        } else {
            interval
        };

        if restore {
            match load_snapshot(&path) {
                Ok(Some(snapshot)) => {
                    let count = snapshot.len();
                    store.replace(snapshot)?;
                    info!(path = ?path, count, "metrics restored");
                }
                Ok(None) => debug!(path = ?path, "snapshot file empty, nothing to restore"),
                Err(e) => warn!(path = ?path, error = %e, "snapshot restore failed, starting empty"),
            }
        }

        Ok(Self {
            store,
            path,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take one snapshot and rewrite the file. Returns the number of metrics
    /// written.
    pub async fn save(&self) -> StoreResult<usize> {
        let snapshot = self.store.snapshot()?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &snapshot))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    /// Run the save loop until shutdown signal, then save once more.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            path = ?self.path,
            interval_secs = self.interval.as_secs(),
            "snapshot persister started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    match self.save().await {
                        Ok(count) => debug!(count, "snapshot saved"),
                        Err(e) => warn!(error = %e, "snapshot save failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("snapshot persister shutting down");
                    match self.save().await {
                        Ok(count) => info!(count, "final snapshot saved"),
                        Err(e) => warn!(error = %e, "final snapshot save failed"),
                    }
                    break;
                }
            }
        }
    }
}

/// Read a snapshot file. `Ok(None)` means the file is empty.
pub fn load_snapshot(path: &Path) -> StoreResult<Option<Snapshot>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let snapshot = serde_json::from_str(&content).map_err(map_err!(Deserialize))?;
    Ok(Some(snapshot))
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> StoreResult<usize> {
    let bytes = serde_json::to_vec(snapshot).map_err(map_err!(Serialize))?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(snapshot.len())
}
