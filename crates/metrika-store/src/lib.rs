//! metrika-store — metric storage for the Metrika server and agent.
//!
//! # Backends
//!
//! - [`MemStore`]: a single `RwLock<HashMap>`; used by the agent and as the
//!   default server store.
//! - [`MemStore`] + [`SnapshotPersister`]: the file-backed store. The
//!   persister periodically writes the whole snapshot to a JSON file and can
//!   restore it at startup.
//! - [`RedbStore`]: an embedded [redb](https://docs.rs/redb) database with
//!   one JSON value per metric.
//!
//! All backends implement [`MetricStore`] and are shared as
//! `Arc<dyn MetricStore>`. [`open_store`] picks one from configuration.

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StoreError::$variant(e.to_string())
    };
}

pub mod database;
pub mod error;
pub mod factory;
pub mod mem;
pub mod persist;
pub mod store;
pub mod tables;

pub use database::RedbStore;
pub use error::{ApplyError, StoreError, StoreResult};
pub use factory::{open_store, OpenedStore, StoreConfig};
pub use mem::MemStore;
pub use persist::{load_snapshot, PersistConfig, SnapshotPersister};
pub use store::MetricStore;
