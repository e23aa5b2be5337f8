//! metrika-core — shared types for the Metrika agent and server.
//!
//! Defines the [`Metric`] entity (a gauge or a counter), the immutable
//! [`Snapshot`] copy handed between the store, persistence and delivery,
//! the JSON wire record with decode-time validation, and the config file
//! formats read by `metrikad`.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, AgentFileConfig, ServerConfig, ServerFileConfig};
pub use error::MetricError;
pub use types::*;
