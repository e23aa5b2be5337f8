//! metrika-api — HTTP surface of the Metrika server.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | HTML table of all metrics |
//! | GET | `/ping` | Storage health check |
//! | GET | `/value/{kind}/{name}` | Plain-text value |
//! | POST | `/update/{kind}/{name}/{value}` | Update from path segments |
//! | POST | `/update/` | Update from a JSON record |
//! | POST | `/value/` | Read a JSON record |
//! | POST | `/updates/` | Apply a batch envelope |

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod page;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use metrika_store::MetricStore;
use metrika_transport::Opener;

pub use error::ApiError;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn MetricStore>,
    pub opener: Arc<Opener>,
}

impl ApiState {
    pub fn new(store: Arc<dyn MetricStore>, opener: Opener) -> Self {
        Self {
            store,
            opener: Arc::new(opener),
        }
    }
}

/// Build the complete API router with logging and gzip layers.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/ping", get(handlers::ping))
        .route("/value/{kind}/{name}", get(handlers::get_value))
        .route("/value/{kind}/{name}/", get(handlers::get_value))
        .route("/update/{kind}/{name}/{value}", post(handlers::update_path))
        .route("/update/", post(handlers::update_json))
        .route("/value/", post(handlers::value_json))
        .route("/updates/", post(handlers::update_batch))
        .with_state(state)
        .layer(from_fn(middleware::gunzip_request))
        .layer(from_fn(middleware::gzip_response))
        .layer(from_fn(middleware::request_logging))
}
