//! metrika-rpc — gRPC surface of the Metrika server and the matching
//! agent transport.
//!
//! # Architecture
//!
//! - **`proto`** — types and service stubs generated from `proto/metrika.proto`
//! - **`server`** — `MetricsGrpcServer`, backed by the same store and
//!   envelope opener as the HTTP API
//! - **`client`** — `RpcTransport`, a [`Transport`](metrika_transport::Transport)
//!   that ships sealed envelopes through `UpdateBatch`

pub mod client;
pub mod proto;
pub mod server;

pub use client::RpcTransport;
pub use server::MetricsGrpcServer;
