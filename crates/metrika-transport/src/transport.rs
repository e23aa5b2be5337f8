//! The `Transport` seam between the delivery workers and the wire.

use std::future::Future;
use std::pin::Pin;

use crate::envelope::{Capabilities, Envelope};
use crate::error::TransportError;

/// Boxed future alias for transport results.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Carries sealed envelopes to the server.
///
/// Implementations perform exactly one attempt per call; retry and timeout
/// policy belongs to the caller.
pub trait Transport: Send + Sync {
    /// Short name for logs (`http`, `grpc`).
    fn name(&self) -> &'static str;

    /// Discover what the server accepts. Failures mean "nothing optional".
    fn probe(&self) -> Pin<Box<dyn Future<Output = Capabilities> + Send + '_>>;

    /// Deliver one envelope. Non-success responses are errors.
    fn send<'a>(&'a self, envelope: &'a Envelope) -> TransportFuture<'a, ()>;
}
