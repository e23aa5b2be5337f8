//! Validation errors for metric records.

use thiserror::Error;

use crate::types::MetricKind;

/// A metric record, kind tag, or raw value failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("unknown metric kind: {0:?}")]
    UnknownKind(String),

    #[error("metric id must not be empty")]
    EmptyId,

    #[error("{kind} metric {id:?} has no {field}")]
    MissingPayload {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },

    #[error("metric {0:?} carries both value and delta")]
    AmbiguousPayload(String),

    #[error("gauge metric {0:?} has a non-finite value")]
    NonFiniteValue(String),

    #[error("invalid {kind} value: {raw:?}")]
    InvalidValue { kind: MetricKind, raw: String },
}
