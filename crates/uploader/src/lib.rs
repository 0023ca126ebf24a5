//! Resumable chunked upload orchestration.
//!
//! An [`Uploader`] manages a set of files bound for one endpoint. Each file
//! is driven through a resume query followed by one write per chunk, with at
//! most one outstanding request per file and at most
//! [`UploaderConfig::max_requests`] outstanding requests per session. Failed
//! attempts are retried; a file that keeps failing is abandoned while the
//! rest of the session continues.
//!
//! The uploader is transport-agnostic: the embedding application supplies a
//! [`Transport`] implementation (see the `resup-http` crate).

mod attempt;
pub mod config;
pub mod error;
mod estimator;
pub mod events;
mod registry;
pub mod retry;
mod scheduler;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

use std::sync::{Mutex, MutexGuard};

pub use config::UploaderConfig;
pub use error::{AttemptFailure, TransportError, UploadError};
pub use events::{EventBus, EventHandler, SubscriptionId};
pub use registry::Validator;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{Uploader, UploaderBuilder};
pub use transport::{
    ProgressFn, QueryRequest, Transport, TransportFuture, TransportResponse, WriteRequest,
};
pub use types::{FileInfo, FileStatus, RejectReason, UploadEvent};

/// Locks `m`, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
