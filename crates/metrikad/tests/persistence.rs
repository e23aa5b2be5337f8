//! Server restarts: what one process writes, the next one reads back.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrika_api::{build_router, ApiState};
use metrika_core::{Metric, ServerConfig};
use metrika_store::{load_snapshot, open_store, MetricStore, StoreConfig};
use metrika_transport::Opener;
use tokio::sync::watch;
use tower::ServiceExt;

fn update(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn server_config(dir: &tempfile::TempDir) -> ServerConfig {
    ServerConfig {
        store_file: Some(dir.path().join("state").join("metrics.json")),
        store_interval: Duration::from_secs(60),
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = server_config(&dir);

    {
        let opened = open_store(&StoreConfig::from(&config)).unwrap();
        let persister = opened.persister.unwrap();
        let app = build_router(ApiState::new(opened.store.clone(), Opener::default()));

        for uri in ["/update/counter/PollCount/4", "/update/gauge/Alloc/1.25"] {
            let resp = app.clone().oneshot(update(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        // Shutdown triggers the final save.
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        persister.run(rx).await;
    }

    let saved = load_snapshot(config.store_file.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(saved.len(), 2);

    let reopened = open_store(&StoreConfig::from(&config)).unwrap();
    assert_eq!(
        reopened.store.get("PollCount").unwrap(),
        Some(Metric::counter("PollCount", 4))
    );
    assert_eq!(
        reopened.store.get("Alloc").unwrap(),
        Some(Metric::gauge("Alloc", 1.25))
    );
}

#[tokio::test]
async fn restore_off_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = server_config(&dir);

    let opened = open_store(&StoreConfig::from(&config)).unwrap();
    opened.store.add_counter("PollCount", 1).unwrap();
    opened.persister.unwrap().save().await.unwrap();

    let config = ServerConfig {
        restore: false,
        ..config
    };
    let reopened = open_store(&StoreConfig::from(&config)).unwrap();
    assert!(reopened.store.snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn database_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        database_path: Some(dir.path().join("metrics.redb")),
        ..ServerConfig::default()
    };

    {
        let opened = open_store(&StoreConfig::from(&config)).unwrap();
        assert!(opened.persister.is_none());
        let app = build_router(ApiState::new(opened.store, Opener::default()));
        for uri in ["/update/counter/PollCount/4", "/update/counter/PollCount/6"] {
            let resp = app.clone().oneshot(update(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    let reopened = open_store(&StoreConfig::from(&config)).unwrap();
    assert_eq!(reopened.store.backend(), "redb");
    assert_eq!(
        reopened.store.get("PollCount").unwrap(),
        Some(Metric::counter("PollCount", 10))
    );

    let app = build_router(ApiState::new(Arc::clone(&reopened.store), Opener::default()));
    let resp = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
