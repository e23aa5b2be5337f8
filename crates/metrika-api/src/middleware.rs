//! Request logging and gzip handling for every route.

use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrika_transport::gzip;
use metrika_transport::headers::{accepts_gzip, ENCODING_GZIP, UPDATES_PATH};
use tracing::{debug, info, info_span, warn, Instrument};

/// Upper bound for a buffered request or response body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

fn is_gzip(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(ENCODING_GZIP))
}

/// Log method, path, status, and latency of every request.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", %method, %path);

    async move {
        let started = Instant::now();
        let response = next.run(req).await;
        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_server_error() {
            warn!(status = status.as_u16(), elapsed_ms, "request failed");
        } else {
            info!(status = status.as_u16(), elapsed_ms, "request handled");
        }
        response
    }
    .instrument(span)
    .await
}

/// Inflate gzip request bodies before they reach a handler.
///
/// The batch endpoint is skipped: its envelope is opened as a whole, since a
/// signature covers the uncompressed JSON.
pub async fn gunzip_request(req: Request, next: Next) -> Response {
    if req.uri().path() == UPDATES_PATH || !is_gzip(req.headers().get(CONTENT_ENCODING)) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let packed = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("failed to read body: {e}")).into_response();
        }
    };
    let plain = match gzip::decompress(&packed) {
        Ok(plain) => plain,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    debug!(packed = packed.len(), plain = plain.len(), "request body inflated");
    parts.headers.remove(CONTENT_ENCODING);
    parts.headers.remove(CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(plain))).await
}

/// Compress responses for clients that accept gzip.
pub async fn gzip_response(req: Request, next: Next) -> Response {
    let wants_gzip = req
        .headers()
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(accepts_gzip);

    let response = next.run(req).await;
    if !wants_gzip || response.headers().contains_key(CONTENT_ENCODING) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let plain = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    match gzip::compress(&plain) {
        Ok(packed) => {
            parts
                .headers
                .insert(CONTENT_ENCODING, HeaderValue::from_static(ENCODING_GZIP));
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(packed))
        }
        Err(e) => {
            warn!(error = %e, "response compression failed, sending plain");
            Response::from_parts(parts, Body::from(plain))
        }
    }
}
