//! gRPC transport for the agent.
//!
//! Carries the same envelope as the HTTP transport, with body and headers
//! moved into [`BatchRequest`](crate::proto::BatchRequest) fields.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use metrika_transport::{Capabilities, Envelope, Transport, TransportError, TransportFuture};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::proto;
use crate::proto::metrics_client::MetricsClient;

/// Default bound on the capability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends envelopes through `UpdateBatch`.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    address: String,
    client: MetricsClient<Channel>,
    probe_timeout: Duration,
}

impl RpcTransport {
    /// `address` is `host:port`. The connection is established lazily on
    /// first use and re-established by the channel after failures.
    pub fn new(address: impl Into<String>) -> Result<Self, TransportError> {
        let address = address.into();
        let address = address
            .strip_prefix("http://")
            .unwrap_or(&address)
            .trim_end_matches('/')
            .to_string();
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| TransportError::Connect(format!("invalid endpoint {address}: {e}")))?;
        Ok(Self::from_channel(address, endpoint.connect_lazy()))
    }

    pub fn from_channel(address: impl Into<String>, channel: Channel) -> Self {
        Self {
            address: address.into(),
            client: MetricsClient::new(channel),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// A client handle sharing this transport's channel.
    pub fn client(&self) -> MetricsClient<Channel> {
        self.client.clone()
    }

    async fn ping(&self) -> Result<bool, TransportError> {
        let resp = self
            .client()
            .ping(proto::PingRequest {})
            .await
            .map_err(|s| TransportError::Rpc(s.to_string()))?;
        Ok(resp.into_inner().accepts_gzip)
    }

    async fn update_batch(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let request = proto::BatchRequest {
            payload: envelope.body.clone(),
            content_type: envelope.content_type.clone(),
            content_encoding: envelope.content_encoding.clone().unwrap_or_default(),
            signature: envelope.signature.clone().unwrap_or_default(),
        };
        let resp = self
            .client()
            .update_batch(request)
            .await
            .map_err(|s| TransportError::Rpc(format!("{:?}: {}", s.code(), s.message())))?;
        debug!(
            address = %self.address,
            accepted = resp.into_inner().accepted,
            "batch delivered over grpc"
        );
        Ok(())
    }
}

impl Transport for RpcTransport {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn probe(&self) -> Pin<Box<dyn Future<Output = Capabilities> + Send + '_>> {
        Box::pin(async move {
            match tokio::time::timeout(self.probe_timeout, self.ping()).await {
                Ok(Ok(gzip)) => Capabilities { gzip },
                Ok(Err(e)) => {
                    debug!(error = %e, address = %self.address, "capability probe failed");
                    Capabilities::default()
                }
                Err(_) => {
                    debug!(address = %self.address, "capability probe timed out");
                    Capabilities::default()
                }
            }
        })
    }

    fn send<'a>(&'a self, envelope: &'a Envelope) -> TransportFuture<'a, ()> {
        Box::pin(self.update_batch(envelope))
    }
}
