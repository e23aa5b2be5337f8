//! gRPC server for `metrika.Metrics`.
//!
//! Each RPC has the same semantics as its HTTP counterpart: same store,
//! same envelope opening, same validation. Client errors map to
//! `InvalidArgument`/`NotFound`, storage failures to `Internal`.

use std::sync::Arc;

use metrika_core::{Metric, MetricKind};
use metrika_store::{ApplyError, MetricStore, StoreError};
use metrika_transport::headers::CONTENT_TYPE_JSON;
use metrika_transport::{Envelope, Opener, TransportError};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::proto;
use crate::proto::metrics_server::{Metrics, MetricsServer};

fn store_status(e: &StoreError) -> Status {
    if e.is_rejection() {
        Status::invalid_argument(e.to_string())
    } else {
        Status::internal(e.to_string())
    }
}

fn apply_status(e: &ApplyError) -> Status {
    if e.source.is_rejection() {
        Status::invalid_argument(e.to_string())
    } else {
        Status::internal(e.to_string())
    }
}

fn transport_status(e: &TransportError) -> Status {
    if e.is_rejection() {
        Status::invalid_argument(e.to_string())
    } else {
        Status::internal(e.to_string())
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// gRPC implementation of the metrics service.
pub struct MetricsGrpcServer {
    store: Arc<dyn MetricStore>,
    opener: Arc<Opener>,
}

impl MetricsGrpcServer {
    pub fn new(store: Arc<dyn MetricStore>, opener: Arc<Opener>) -> Self {
        Self { store, opener }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> MetricsServer<Self> {
        MetricsServer::new(self)
    }
}

#[tonic::async_trait]
impl Metrics for MetricsGrpcServer {
    async fn get_metric(
        &self,
        request: Request<proto::GetMetricRequest>,
    ) -> Result<Response<proto::MetricResponse>, Status> {
        let req = request.into_inner();
        let kind: MetricKind = req
            .kind
            .parse()
            .map_err(|e: metrika_core::MetricError| Status::invalid_argument(e.to_string()))?;

        match self.store.get(&req.id).map_err(|e| store_status(&e))? {
            Some(metric) if metric.kind() == kind => Ok(Response::new(proto::MetricResponse {
                metric: Some(metric.into()),
            })),
            _ => Err(Status::not_found(format!("{kind} metric {:?} not found", req.id))),
        }
    }

    async fn update_metric(
        &self,
        request: Request<proto::MetricMessage>,
    ) -> Result<Response<proto::MetricResponse>, Status> {
        let metric = Metric::try_from(request.into_inner())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let stored = self.store.apply(&metric).map_err(|e| store_status(&e))?;
        debug!(id = %stored.id, value = %stored.value, "metric updated over grpc");
        Ok(Response::new(proto::MetricResponse {
            metric: Some(stored.into()),
        }))
    }

    async fn update_batch(
        &self,
        request: Request<proto::BatchRequest>,
    ) -> Result<Response<proto::BatchResponse>, Status> {
        let req = request.into_inner();
        let envelope = Envelope {
            body: req.payload,
            content_type: non_empty(req.content_type)
                .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string()),
            content_encoding: non_empty(req.content_encoding),
            signature: non_empty(req.signature),
        };

        let metrics = self.opener.open(&envelope).map_err(|e| transport_status(&e))?;
        let accepted = self
            .store
            .apply_all(&metrics)
            .map_err(|e| apply_status(&e))?;
        debug!(accepted, "batch applied over grpc");

        Ok(Response::new(proto::BatchResponse {
            accepted: accepted as u64,
        }))
    }

    async fn ping(
        &self,
        _request: Request<proto::PingRequest>,
    ) -> Result<Response<proto::PingResponse>, Status> {
        self.store
            .health_check()
            .map_err(|e| Status::unavailable(e.to_string()))?;
        Ok(Response::new(proto::PingResponse { accepts_gzip: true }))
    }
}
