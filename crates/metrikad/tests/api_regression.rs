//! HTTP API regression tests.
//!
//! Drives the full router (middleware included) the way an agent would:
//! batches are sealed with the agent's `Sealer` and posted as-is.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrika_api::{build_router, ApiState};
use metrika_core::{Metric, Snapshot};
use metrika_store::{MemStore, MetricStore};
use metrika_transport::headers::HASH_HEADER;
use metrika_transport::{Capabilities, DecryptionKey, EncryptionKey, Envelope, Opener, Sealer};
use tower::ServiceExt;

fn router(store: Arc<MemStore>, opener: Opener) -> Router {
    build_router(ApiState::new(store, opener))
}

fn batch() -> Snapshot {
    vec![Metric::counter("PollCount", 5), Metric::gauge("Alloc", 123.4)]
        .into_iter()
        .collect()
}

fn envelope_request(envelope: Envelope) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header("content-type", envelope.content_type.as_str());
    if let Some(encoding) = &envelope.content_encoding {
        builder = builder.header("content-encoding", encoding.as_str());
    }
    if let Some(signature) = &envelope.signature {
        builder = builder.header(HASH_HEADER, signature.as_str());
    }
    builder.body(Body::from(envelope.body)).unwrap()
}

async fn text(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn key_pair() -> (EncryptionKey, DecryptionKey) {
    let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let public = rsa::RsaPublicKey::from(&private);
    (EncryptionKey::from(public), DecryptionKey::from(private))
}

#[tokio::test]
async fn two_batches_accumulate_counter_and_keep_gauge() {
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::default());
    let sealer = Sealer::default();

    for _ in 0..2 {
        let envelope = sealer.seal(&batch()).unwrap();
        let resp = app.clone().oneshot(envelope_request(envelope)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["accepted"], 2);
    }

    assert_eq!(text(&app, "/value/counter/PollCount/").await, (StatusCode::OK, "10".into()));
    assert_eq!(text(&app, "/value/gauge/Alloc/").await, (StatusCode::OK, "123.4".into()));
}

#[tokio::test]
async fn gzip_batch_from_sealer() {
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::default());
    let sealer = Sealer::default().with_capabilities(Capabilities { gzip: true });

    let envelope = sealer.seal(&batch()).unwrap();
    assert!(envelope.is_gzip());
    let resp = app.oneshot(envelope_request(envelope)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.get("PollCount").unwrap(), Some(Metric::counter("PollCount", 5)));
}

#[tokio::test]
async fn signed_batch_and_signed_response() {
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::new(Some("secret".into()), None));
    let sealer = Sealer::new(Some("secret".into()), None);

    let envelope = sealer.seal(&batch()).unwrap();
    assert!(envelope.signature.is_some());
    let resp = app.clone().oneshot(envelope_request(envelope)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(HASH_HEADER));
    assert_eq!(store.len(), 2);

    // A different secret fails verification and changes nothing.
    let forged = Sealer::new(Some("other".into()), None).seal(&batch()).unwrap();
    let resp = app.clone().oneshot(envelope_request(forged)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // No signature on a plain payload is refused.
    let unsigned = Sealer::default().seal(&batch()).unwrap();
    let resp = app.oneshot(envelope_request(unsigned)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(store.get("PollCount").unwrap(), Some(Metric::counter("PollCount", 5)));
}

#[tokio::test]
async fn encrypted_batch_round_trip() {
    let (public, private) = key_pair();
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::new(None, Some(private)));
    let sealer = Sealer::new(None, Some(public)).with_capabilities(Capabilities { gzip: true });

    let envelope = sealer.seal(&batch()).unwrap();
    assert!(envelope.is_encrypted());
    assert!(!envelope.is_gzip());
    let resp = app.oneshot(envelope_request(envelope)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.get("Alloc").unwrap(), Some(Metric::gauge("Alloc", 123.4)));
}

#[tokio::test]
async fn encrypted_batch_without_server_key_is_rejected() {
    let (public, _) = key_pair();
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::default());

    let envelope = Sealer::new(None, Some(public)).seal(&batch()).unwrap();
    let resp = app.oneshot(envelope_request(envelope)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn path_and_json_updates_share_one_store() {
    let store = Arc::new(MemStore::default());
    let app = router(store.clone(), Opener::default());

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/update/counter/PollCount/2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/update/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"PollCount","type":"counter","delta":3}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(text(&app, "/value/counter/PollCount").await.1, "5");
    assert_eq!(text(&app, "/value/gauge/PollCount").await.0, StatusCode::NOT_FOUND);
}
