//! Metric API handlers.
//!
//! Text endpoints (`/value/{kind}/{name}`, `/update/{kind}/{name}/{value}`)
//! answer with the plain value; JSON endpoints answer with wire records.

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use metrika_core::{Metric, MetricKind, MetricQuery, MetricValue};
use metrika_transport::headers::{CONTENT_TYPE_JSON, HASH_HEADER};
use metrika_transport::{signing, Envelope};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::ApiState;

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Look up `id` and require it to be of `kind`. A kind mismatch is reported
/// as not found.
fn find(state: &ApiState, kind: MetricKind, id: &str) -> Result<Metric, ApiError> {
    match state.store.get(id)? {
        Some(metric) if metric.kind() == kind => Ok(metric),
        _ => Err(ApiError::NotFound(format!("{kind} metric {id:?} not found"))),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /ping
pub async fn ping(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.health_check() {
        Ok(()) => (StatusCode::OK, "pong".to_string()),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ── Path endpoints ─────────────────────────────────────────────

/// GET /value/{kind}/{name}
pub async fn get_value(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let metric = find(&state, kind, &name)?;
    Ok(metric.value.to_string())
}

/// POST /update/{kind}/{name}/{value}
pub async fn update_path(
    State(state): State<ApiState>,
    Path((kind, name, raw)): Path<(String, String, String)>,
) -> Result<String, ApiError> {
    let kind: MetricKind = kind.parse()?;
    if name.is_empty() {
        return Err(ApiError::NotFound("metric name is required".into()));
    }
    let value = MetricValue::parse(kind, &raw)?;
    let stored = state.store.apply(&Metric { id: name, value })?;
    debug!(id = %stored.id, value = %stored.value, "metric updated");
    Ok(stored.value.to_string())
}

// ── JSON endpoints ─────────────────────────────────────────────

/// POST /update/
pub async fn update_json(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let metric: Metric = serde_json::from_slice(&body)?;
    let stored = state.store.apply(&metric)?;
    debug!(id = %stored.id, value = %stored.value, "metric updated");
    Ok(Json(stored))
}

/// POST /value/
pub async fn value_json(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let query: MetricQuery = serde_json::from_slice(&body)?;
    let kind = query.kind()?;
    Ok(Json(find(&state, kind, &query.id)?))
}

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub accepted: usize,
}

/// POST /updates/
///
/// The body is an envelope: its headers say whether it is encrypted,
/// compressed, or signed. Every record is validated before any is applied;
/// application then runs in order and stops at the first store error.
pub async fn update_batch(
    State(state): State<ApiState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let envelope = Envelope {
        body,
        content_type: header_string(&headers, CONTENT_TYPE.as_str())
            .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string()),
        content_encoding: header_string(&headers, CONTENT_ENCODING.as_str()),
        signature: header_string(&headers, HASH_HEADER),
    };

    let metrics = state.opener.open(&envelope)?;
    let accepted = state.store.apply_all(&metrics)?;
    debug!(accepted, "batch applied");

    let mut response_headers = HeaderMap::new();
    if let Some(secret) = state.opener.secret() {
        let signature = signing::sign_response(
            secret,
            CONTENT_TYPE_JSON,
            uri.path(),
            uri.query().unwrap_or(""),
        );
        if let Ok(value) = HeaderValue::from_str(&signature) {
            response_headers.insert(HASH_HEADER, value);
        }
    }

    Ok((response_headers, Json(BatchAccepted { accepted })))
}
