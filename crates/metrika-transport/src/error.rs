//! Error types for batch sealing, opening, and delivery.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while preparing, sending, or opening a batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("compression error: {0}")]
    Compress(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl TransportError {
    /// True for failures caused by the batch itself rather than the link.
    /// The receiving side answers these with a client error.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransportError::Decode(_)
                | TransportError::Compress(_)
                | TransportError::Crypto(_)
                | TransportError::Key(_)
                | TransportError::Signature(_)
        )
    }
}
