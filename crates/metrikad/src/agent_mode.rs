//! Agent mode — samples metrics and pushes them to a server.
//!
//! In this mode, the daemon:
//! 1. Polls the runtime and system collectors into a local store
//! 2. Probes the server once for gzip support
//! 3. Snapshots the store every report interval onto a bounded queue
//! 4. Delivers batches with `rate_limit` workers, each with bounded retry
//! 5. On SIGINT or SIGTERM, stops sampling and reporting, then drains the
//!    workers

use std::sync::Arc;

use metrika_agent::{BatchSender, Dispatcher, Poller, RuntimeCollector, SystemCollector, WorkerPool};
use metrika_core::AgentConfig;
use metrika_rpc::RpcTransport;
use metrika_store::{MemStore, MetricStore};
use metrika_transport::{EncryptionKey, HttpTransport, Sealer, Transport};
use tokio::sync::watch;
use tracing::info;

/// Run the agent until SIGINT or SIGTERM.
pub async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    info!(address = %config.address, "Metrika agent starting");

    // ── Local store and sampling ───────────────────────────────
    let store: Arc<dyn MetricStore> = Arc::new(MemStore::new());
    let poller = Poller::new(store.clone(), config.poll_interval)
        .with_collector(RuntimeCollector::new())
        .with_collector(SystemCollector::new());

    // ── Transport ──────────────────────────────────────────────
    let transport: Arc<dyn Transport> = match &config.grpc_address {
        Some(addr) => Arc::new(RpcTransport::new(addr.as_str())?),
        None => Arc::new(HttpTransport::new(config.address.as_str())),
    };
    let capabilities = transport.probe().await;
    info!(
        transport = transport.name(),
        gzip = capabilities.gzip,
        "server capabilities probed"
    );

    let public_key = config
        .crypto_key
        .as_deref()
        .map(EncryptionKey::from_file)
        .transpose()?;
    if public_key.is_some() {
        info!("batch encryption enabled");
    }
    let sealer = Sealer::new(config.key.clone(), public_key).with_capabilities(capabilities);

    // ── Delivery ───────────────────────────────────────────────
    let sender = Arc::new(BatchSender::new(transport, sealer));
    let pool = WorkerPool::spawn(config.rate_limit, sender);
    let stats = pool.stats();
    let dispatcher = Dispatcher::new(store, pool.queue(), config.report_interval);

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_handle = tokio::spawn(poller.run(shutdown_rx.clone()));
    let dispatch_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    crate::signal::shutdown_signal(false).await;
    let _ = shutdown_tx.send(true);

    let _ = poll_handle.await;
    let dropped = dispatch_handle.await.unwrap_or_default();
    pool.shutdown().await;

    info!(
        delivered = stats.delivered(),
        abandoned = stats.abandoned(),
        dropped,
        "Metrika agent stopped"
    );
    Ok(())
}
