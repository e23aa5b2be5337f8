//! Store selection from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use metrika_core::ServerConfig;
use tracing::{info, warn};

use crate::database::RedbStore;
use crate::error::StoreResult;
use crate::mem::MemStore;
use crate::persist::{PersistConfig, SnapshotPersister};
use crate::store::MetricStore;

/// Which backend to open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreConfig {
    /// redb database file. Takes priority over `snapshot`.
    pub database_path: Option<PathBuf>,
    /// Snapshot file persistence for the in-memory store.
    pub snapshot: Option<PersistConfig>,
}

impl From<&ServerConfig> for StoreConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            database_path: config.database_path.clone(),
            snapshot: config.store_file.as_ref().map(|path| PersistConfig {
                path: path.clone(),
                interval: config.store_interval,
                restore: config.restore,
            }),
        }
    }
}

/// The selected store plus its persistence task, if any.
pub struct OpenedStore {
    pub store: Arc<dyn MetricStore>,
    pub persister: Option<SnapshotPersister>,
}

/// Open the configured backend.
///
/// Priority: database, then file-backed memory, then plain memory. A
/// database that cannot be opened is an error; a snapshot file that cannot
/// be prepared is logged and the store runs memory-only.
pub fn open_store(config: &StoreConfig) -> StoreResult<OpenedStore> {
    if let Some(path) = &config.database_path {
        let store = RedbStore::open(path)?;
        store.health_check()?;
        info!(path = ?path, "using redb metric store");
        return Ok(OpenedStore {
            store: Arc::new(store),
            persister: None,
        });
    }

    let store: Arc<dyn MetricStore> = Arc::new(MemStore::new());

    let persister = match &config.snapshot {
        Some(persist) => match SnapshotPersister::enable(store.clone(), persist.clone()) {
            Ok(persister) => {
                info!(path = ?persist.path, "using file-backed metric store");
                Some(persister)
            }
            Err(e) => {
                warn!(
                    path = ?persist.path,
                    error = %e,
                    "snapshot persistence unavailable, continuing in memory only"
                );
                None
            }
        },
        None => {
            info!("using in-memory metric store");
            None
        }
    };

    Ok(OpenedStore { store, persister })
}
