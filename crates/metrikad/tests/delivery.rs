//! Agent-to-server delivery over a real HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use metrika_agent::{
    BatchSender, DeliveryOutcome, Dispatch, Dispatcher, Poller, RetryPolicy, RuntimeCollector,
    WorkerPool,
};
use metrika_api::{build_router, ApiState};
use metrika_core::{Metric, MetricKind};
use metrika_store::{MemStore, MetricStore};
use metrika_transport::{HttpTransport, Opener, Sealer, Transport};

async fn spawn_server(store: Arc<MemStore>, opener: Opener) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(ApiState::new(store, opener));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

#[tokio::test]
async fn probe_sees_gzip_support() {
    let addr = spawn_server(Arc::new(MemStore::default()), Opener::default()).await;
    let transport = HttpTransport::new(addr);
    assert!(transport.probe().await.gzip);
}

#[tokio::test]
async fn polled_metrics_reach_the_server() {
    let server_store = Arc::new(MemStore::default());
    let addr = spawn_server(
        server_store.clone(),
        Opener::new(Some("k".into()), None),
    )
    .await;

    let agent_store: Arc<dyn MetricStore> = Arc::new(MemStore::default());
    let mut poller = Poller::new(agent_store.clone(), Duration::from_secs(2))
        .with_collector(RuntimeCollector::new());
    assert!(poller.poll_once() > 0);

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(addr));
    let capabilities = transport.probe().await;
    let sealer = Sealer::new(Some("k".into()), None).with_capabilities(capabilities);
    let pool = WorkerPool::spawn(2, Arc::new(BatchSender::new(transport, sealer)));
    let stats = pool.stats();

    let dispatcher = Dispatcher::new(agent_store, pool.queue(), Duration::from_secs(10));
    assert!(matches!(dispatcher.dispatch_once(), Dispatch::Submitted { .. }));
    drop(dispatcher);
    pool.shutdown().await;

    assert_eq!(stats.delivered(), 1);
    let poll_count = server_store.get("PollCount").unwrap().unwrap();
    assert_eq!(poll_count, Metric::counter("PollCount", 1));
    let random = server_store.get("RandomValue").unwrap().unwrap();
    assert_eq!(random.kind(), MetricKind::Gauge);
}

#[tokio::test]
async fn refused_batches_are_abandoned_after_retries() {
    // Server expects a signature the agent cannot produce.
    let server_store = Arc::new(MemStore::default());
    let addr = spawn_server(server_store.clone(), Opener::new(Some("k".into()), None)).await;

    let policy = RetryPolicy {
        max_attempts: 3,
        delays: vec![Duration::from_millis(10)],
        attempt_timeout: Duration::from_secs(5),
    };
    let sender = BatchSender::new(Arc::new(HttpTransport::new(addr)), Sealer::default())
        .with_policy(policy);

    let batch = vec![Metric::counter("PollCount", 1)].into_iter().collect();
    assert_eq!(
        sender.deliver(&batch).await,
        DeliveryOutcome::Abandoned { attempts: 3 }
    );
    assert!(server_store.is_empty());
}
