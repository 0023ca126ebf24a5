//! Transport collaborator trait.
//!
//! The uploader never talks HTTP itself. A [`Transport`] implementation
//! (see the `resup-http` crate) performs the two request kinds; keeping it
//! behind a trait decouples scheduling from the network and lets tests drive
//! the state machine with scripted responses.
//!
//! Aborting an operation is done by dropping its future.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::TransportError;

/// Read-style request: `GET url?params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Write-style request: multipart `POST url` with text fields and one
/// binary part named `field_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub url: String,
    pub fields: Vec<(String, String)>,
    pub field_name: String,
    pub data: Vec<u8>,
}

/// Status and text body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Callback receiving `(bytes_loaded, total_bytes)` while a write is sent.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Future returned by transport operations.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;

/// Performs network requests on behalf of an uploader.
pub trait Transport: Send + Sync {
    /// Sends a read request. Implementations should honor `request.timeout`.
    fn get(&self, request: QueryRequest) -> TransportFuture<'_>;

    /// Sends a multipart write, reporting upload progress of `request.data`.
    fn post_multipart(&self, request: WriteRequest, progress: ProgressFn) -> TransportFuture<'_>;
}
