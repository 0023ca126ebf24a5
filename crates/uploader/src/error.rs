//! Error types.

use resup_protocol::ProtocolError;
use resup_transfer::TransferError;

/// Errors returned by the uploader API.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no Tokio runtime available")]
    NoRuntime,
}

/// A transport attempt that did not produce a `200` response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("failed to read chunk: {0}")]
    Read(#[from] TransferError),
}

/// Why a single protocol attempt failed. Every variant is recoverable and
/// counts as one retry.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol failure: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("order mismatch: expected {expected} stored chunks, server reports {reported}")]
    OrderMismatch { expected: u64, reported: u64 },
}
