//! Metric domain types and the JSON wire schema.
//!
//! A [`Metric`] carries exactly one payload: a gauge value (`f64`) or a
//! counter total (`i64`). On the wire it is a flat record
//! `{"id", "type", "value" | "delta"}`; decoding goes through
//! [`MetricRecord`] so that the kind tag decides which payload field is
//! required and anything ambiguous is rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MetricError;

// ── Kind ───────────────────────────────────────────────────────────

/// Update semantics of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Current value overwrites the prior one.
    Gauge,
    /// Running total updated by adding deltas.
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

// ── Value ──────────────────────────────────────────────────────────

/// The typed payload of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Parse a raw path segment (`/update/{kind}/{name}/{value}`) for `kind`.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, MetricError> {
        let invalid = || MetricError::InvalidValue {
            kind,
            raw: raw.to_string(),
        };
        match kind {
            MetricKind::Gauge => {
                let value: f64 = raw.parse().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(invalid());
                }
                Ok(MetricValue::Gauge(value))
            }
            MetricKind::Counter => raw.parse().map(MetricValue::Counter).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(v) => write!(f, "{v}"),
            MetricValue::Counter(d) => write!(f, "{d}"),
        }
    }
}

// ── Metric ─────────────────────────────────────────────────────────

/// A named gauge or counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricRecord", try_from = "MetricRecord")]
pub struct Metric {
    pub id: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Flat wire representation of a [`Metric`].
///
/// Serialization omits whichever payload field does not apply. The kind tag
/// stays a string here so an unknown tag surfaces as
/// [`MetricError::UnknownKind`] rather than a generic serde message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl From<Metric> for MetricRecord {
    fn from(metric: Metric) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(v) => (None, Some(v)),
            MetricValue::Counter(d) => (Some(d), None),
        };
        Self {
            id: metric.id,
            kind: metric.value.kind().as_str().to_string(),
            delta,
            value,
        }
    }
}

impl TryFrom<MetricRecord> for Metric {
    type Error = MetricError;

    fn try_from(record: MetricRecord) -> Result<Self, Self::Error> {
        if record.id.is_empty() {
            return Err(MetricError::EmptyId);
        }
        let kind: MetricKind = record.kind.parse()?;
        let value = match (kind, record.value, record.delta) {
            (_, Some(_), Some(_)) => return Err(MetricError::AmbiguousPayload(record.id)),
            (MetricKind::Gauge, Some(v), None) if !v.is_finite() => {
                return Err(MetricError::NonFiniteValue(record.id));
            }
            (MetricKind::Gauge, Some(v), None) => MetricValue::Gauge(v),
            (MetricKind::Counter, None, Some(d)) => MetricValue::Counter(d),
            (MetricKind::Gauge, _, _) => {
                return Err(MetricError::MissingPayload {
                    id: record.id,
                    kind,
                    field: "value",
                });
            }
            (MetricKind::Counter, _, _) => {
                return Err(MetricError::MissingPayload {
                    id: record.id,
                    kind,
                    field: "delta",
                });
            }
        };
        Ok(Metric {
            id: record.id,
            value,
        })
    }
}

/// Body of a JSON read request (`POST /value/`): id and kind, no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl MetricQuery {
    pub fn kind(&self) -> Result<MetricKind, MetricError> {
        self.kind.parse()
    }
}

// ── Snapshot ───────────────────────────────────────────────────────

/// Immutable point-in-time copy of a store's full contents.
///
/// Ordered by id so that every encoding of the same snapshot is identical.
/// Serializes as a JSON object `{id: record}` (the persisted file format).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Metric>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Metric> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Metrics in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.0.values()
    }
}

impl FromIterator<Metric> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Self {
        Self(iter.into_iter().map(|m| (m.id.clone(), m)).collect())
    }
}

impl IntoIterator for Snapshot {
    type Item = Metric;
    type IntoIter = std::collections::btree_map::IntoValues<String, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    /// Map keys are re-derived from each record's own id.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Metric>::deserialize(deserializer)?;
        Ok(map.into_values().collect())
    }
}
