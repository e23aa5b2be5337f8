//! metrika-transport — how batches travel from agent to server.
//!
//! The agent turns a [`Snapshot`](metrika_core::Snapshot) into an
//! [`Envelope`] with a [`Sealer`] (JSON, then RSA encryption *or* gzip *or*
//! an HMAC signature) and hands it to a [`Transport`]. The server reverses
//! the process with an [`Opener`], whichever surface (HTTP or gRPC) the
//! envelope arrived on.

pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod gzip;
pub mod headers;
pub mod http;
pub mod signing;
pub mod transport;

pub use crypto::{DecryptionKey, EncryptionKey};
pub use envelope::{Capabilities, Envelope, Opener, Sealer};
pub use error::TransportError;
pub use self::http::HttpTransport;
pub use transport::{Transport, TransportFuture};
