//! One protocol attempt for one file.
//!
//! [`plan`] decides which request a file needs next, [`apply`] folds the
//! transport outcome back into the file. Both run under the session lock;
//! the request itself runs in between without it.

use std::ops::Range;

use resup_protocol::{ResumeQuery, parse_chunk_count};

use crate::error::{AttemptFailure, TransportError};
use crate::registry::FileEntry;
use crate::transport::TransportResponse;
use crate::types::FileStatus;

/// The request a file needs next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptPlan {
    /// Ask the server for its resume point.
    Query(ResumeQuery),
    /// Send one chunk.
    Write {
        file_id: String,
        /// 1-based.
        chunk_number: u64,
        range: Range<u64>,
    },
}

impl AttemptPlan {
    pub(crate) fn kind(&self) -> AttemptKind {
        match self {
            Self::Query(_) => AttemptKind::Query,
            Self::Write { chunk_number, .. } => AttemptKind::Write {
                chunk_number: *chunk_number,
            },
        }
    }
}

/// What an outstanding attempt was doing, kept for settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptKind {
    Query,
    Write { chunk_number: u64 },
}

/// Returns the next request for `entry`, moving `Pending` files to
/// `Preparing`. Terminal files have nothing to send.
pub(crate) fn plan(entry: &mut FileEntry) -> Option<AttemptPlan> {
    match entry.status {
        FileStatus::Pending | FileStatus::Preparing => {
            entry.status = FileStatus::Preparing;
            Some(AttemptPlan::Query(ResumeQuery {
                file_id: entry.id.clone(),
                file_name: entry.name.clone(),
                file_size: entry.size(),
            }))
        }
        FileStatus::Uploading => Some(AttemptPlan::Write {
            file_id: entry.id.clone(),
            chunk_number: entry.uploaded_chunks + 1,
            range: entry.layout.next_range(entry.uploaded_chunks),
        }),
        FileStatus::Complete | FileStatus::Error => None,
    }
}

/// Folds a settled attempt into `entry`. Every error counts one retry.
pub(crate) fn apply(
    entry: &mut FileEntry,
    kind: AttemptKind,
    outcome: Result<TransportResponse, TransportError>,
) -> Result<(), AttemptFailure> {
    let result = fold(entry, kind, outcome);
    if result.is_err() {
        entry.retries = entry.retries.saturating_add(1);
    }
    result
}

fn fold(
    entry: &mut FileEntry,
    kind: AttemptKind,
    outcome: Result<TransportResponse, TransportError>,
) -> Result<(), AttemptFailure> {
    let response = outcome?;
    if !response.is_ok() {
        return Err(TransportError::Status(response.status).into());
    }

    let total = entry.total_chunks();
    let count = match parse_chunk_count(&response.body, total) {
        Ok(count) => count,
        Err(e) => {
            entry.status = FileStatus::Preparing;
            return Err(e.into());
        }
    };

    entry.uploaded_chunks = count;
    entry.status = if count == total {
        FileStatus::Complete
    } else {
        FileStatus::Uploading
    };

    match kind {
        AttemptKind::Query => Ok(()),
        AttemptKind::Write { chunk_number } if count == chunk_number => {
            entry.retries = 0;
            Ok(())
        }
        AttemptKind::Write { chunk_number } => Err(AttemptFailure::OrderMismatch {
            expected: chunk_number,
            reported: count,
        }),
    }
}
