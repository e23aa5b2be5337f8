//! HTTP/1.1 transport over hyper.
//!
//! One TCP connection per request: batches go out every few seconds at
//! most, so there is nothing to gain from pooling.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, Response};
use http_body_util::{Empty, Full};
use hyper::body::{Body, Incoming};
use hyper_util::rt::TokioIo;
use tracing::debug;

use crate::envelope::{Capabilities, Envelope};
use crate::error::TransportError;
use crate::headers::{ENCODING_GZIP, HASH_HEADER, UPDATES_PATH};
use crate::transport::{Transport, TransportFuture};

const AGENT_USER_AGENT: &str = concat!("metrika-agent/", env!("CARGO_PKG_VERSION"));

/// Default bound on the capability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends envelopes as `POST /updates/` to a server's HTTP address.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    address: String,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// `address` is `host:port`; a leading `http://` is tolerated.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let address = address
            .strip_prefix("http://")
            .unwrap_or(&address)
            .trim_end_matches('/')
            .to_string();
        Self {
            address,
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

    async fn request<B>(&self, req: Request<B>) -> Result<Response<Incoming>, TransportError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.address)))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        sender
            .send_request(req)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))
    }

    async fn probe_gzip(&self) -> Result<bool, TransportError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(format!("http://{}/", self.address))
            .header(HOST, &self.address)
            .header(USER_AGENT, AGENT_USER_AGENT)
            .header(ACCEPT_ENCODING, ENCODING_GZIP)
            .body(Empty::<Bytes>::new())
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        let resp = self.request(req).await?;
        Ok(resp
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case(ENCODING_GZIP)))
    }

    async fn post_updates(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let uri = format!("http://{}{UPDATES_PATH}", self.address);
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(HOST, &self.address)
            .header(USER_AGENT, AGENT_USER_AGENT)
            .header(CONTENT_TYPE, &envelope.content_type);
        if let Some(encoding) = &envelope.content_encoding {
            builder = builder.header(CONTENT_ENCODING, encoding);
        }
        if let Some(signature) = &envelope.signature {
            builder = builder.header(HASH_HEADER, signature);
        }
        let req = builder
            .body(Full::new(envelope.body.clone()))
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        let resp = self.request(req).await?;
        if resp.status().is_success() {
            debug!(%uri, bytes = envelope.body.len(), "batch delivered");
            Ok(())
        } else {
            debug!(status = %resp.status(), %uri, "batch refused");
            Err(TransportError::Status(resp.status().as_u16()))
        }
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn probe(&self) -> Pin<Box<dyn Future<Output = Capabilities> + Send + '_>> {
        Box::pin(async move {
            match tokio::time::timeout(self.probe_timeout, self.probe_gzip()).await {
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
        Box::pin(self.post_updates(envelope))
    }
}
