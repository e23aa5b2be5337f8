//! Server mode — stores metrics and serves the API.
//!
//! In this mode, the daemon:
//! 1. Opens the configured store (redb, file-backed memory, or memory)
//! 2. Starts the snapshot persister when file persistence is on
//! 3. Serves the HTTP API, and the gRPC service when an address is set
//! 4. On SIGINT, SIGTERM or SIGQUIT, stops accepting requests, lets in-flight
//!    ones finish, and only then writes the final snapshot

use std::future::Future;
use std::sync::Arc;

use metrika_api::{build_router, ApiState};
use metrika_core::ServerConfig;
use metrika_rpc::MetricsGrpcServer;
use metrika_store::{open_store, MetricStore, SnapshotPersister, StoreConfig};
use metrika_transport::{DecryptionKey, Opener};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Run the metrics server until a shutdown signal.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    info!(address = %config.address, "Metrika server starting");

    // ── Store ──────────────────────────────────────────────────
    let opened = open_store(&StoreConfig::from(&config))?;
    info!(backend = opened.store.backend(), "metric store ready");

    // ── Batch opener ───────────────────────────────────────────
    let private_key = config
        .crypto_key
        .as_deref()
        .map(DecryptionKey::from_file)
        .transpose()?;
    if private_key.is_some() {
        info!("encrypted batches enabled");
    }
    let opener = Arc::new(Opener::new(config.key.clone(), private_key));

    // ── Listeners ──────────────────────────────────────────────
    let listener = TcpListener::bind(&config.address).await?;
    let grpc_listener = match &config.grpc_address {
        Some(addr) => Some(TcpListener::bind(addr).await?),
        None => None,
    };

    serve(
        Listeners {
            http: listener,
            grpc: grpc_listener,
        },
        opened.store,
        opener,
        opened.persister,
        crate::signal::shutdown_signal(true),
    )
    .await?;

    info!("Metrika server stopped");
    Ok(())
}

pub(crate) struct Listeners {
    pub http: TcpListener,
    pub grpc: Option<TcpListener>,
}

/// Serve until `shutdown` resolves.
///
/// The persister has its own stop channel, flipped only after both servers
/// have drained, so every acknowledged update is in the final snapshot.
pub(crate) async fn serve(
    listeners: Listeners,
    store: Arc<dyn MetricStore>,
    opener: Arc<Opener>,
    persister: Option<SnapshotPersister>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    // ── Shutdown signal ────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    // ── Background tasks ───────────────────────────────────────
    let (persist_tx, persist_rx) = watch::channel(false);
    let persist_handle =
        persister.map(|persister| tokio::spawn(async move { persister.run(persist_rx).await }));

    let grpc_handle = match listeners.grpc {
        Some(listener) => {
            info!(addr = %listener.local_addr()?, "gRPC server starting");
            let service = MetricsGrpcServer::new(store.clone(), opener.clone()).into_service();
            let rx = stop_rx.clone();
            Some(tokio::spawn(async move {
                tonic::transport::Server::builder()
                    .add_service(service)
                    .serve_with_incoming_shutdown(
                        TcpListenerStream::new(listener),
                        shutdown_requested(rx),
                    )
                    .await
            }))
        }
        None => None,
    };

    // ── HTTP API ───────────────────────────────────────────────
    let router = build_router(ApiState { store, opener });
    info!(addr = %listeners.http.local_addr()?, "API server starting");

    let served = axum::serve(listeners.http, router)
        .with_graceful_shutdown(shutdown_requested(stop_rx))
        .await;

    if let Some(handle) = grpc_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "gRPC server stopped with error"),
            Err(e) => warn!(error = %e, "gRPC server task failed"),
        }
    }

    // Both servers are drained; nothing can change the store any more.
    let _ = persist_tx.send(true);
    if let Some(handle) = persist_handle {
        let _ = handle.await;
    }

    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use metrika_core::Metric;
    use metrika_store::{load_snapshot, MemStore, PersistConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn final_snapshot_includes_requests_in_flight_at_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let store: Arc<dyn MetricStore> = Arc::new(MemStore::new());
        let persister = SnapshotPersister::enable(
            store.clone(),
            PersistConfig {
                path: path.clone(),
                interval: Duration::from_secs(300),
                restore: false,
            },
        )
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            Listeners {
                http: listener,
                grpc: None,
            },
            store,
            Arc::new(Opener::default()),
            Some(persister),
            async move {
                let _ = stop_rx.await;
            },
        ));

        // Headers first: the request is in flight when shutdown starts.
        let body = r#"{"id":"PollCount","type":"counter","delta":7}"#;
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        let head = format!(
            "POST /update/ HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        conn.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        stop_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        conn.write_all(body.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), conn.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let saved = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(saved.get("PollCount"), Some(&Metric::counter("PollCount", 7)));
    }

    #[tokio::test]
    async fn grpc_and_http_stop_together() {
        let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let grpc = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            Listeners {
                http,
                grpc: Some(grpc),
            },
            Arc::new(MemStore::new()),
            Arc::new(Opener::default()),
            None,
            async move {
                let _ = stop_rx.await;
            },
        ));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
