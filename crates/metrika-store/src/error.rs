//! Error types for the metric store.

use metrika_core::MetricKind;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metric {id:?} is a {existing}, cannot update it as a {requested}")]
    KindConflict {
        id: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("gauge {id:?} cannot hold the non-finite value {value}")]
    NonFinite { id: String, value: f64 },
}

impl StoreError {
    /// True when the caller sent something the store refuses, as opposed to
    /// the store itself failing.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::KindConflict { .. } | StoreError::NonFinite { .. }
        )
    }
}

/// A batch stopped part-way; the first `applied` records were kept.
#[derive(Debug, Error)]
#[error("batch stopped after {applied} record(s): {source}")]
pub struct ApplyError {
    pub applied: usize,
    #[source]
    pub source: StoreError,
}
