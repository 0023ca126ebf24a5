//! Public data types.

use std::fmt;

use serde::Serialize;

/// Per-file transfer state.
///
/// ```text
/// Pending -> Preparing -> Uploading -> Complete
///               |            |
///               +-----+------+
///                     v
///                   Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Added, never attempted.
    Pending,
    /// Waiting for a resume point from the server.
    Preparing,
    /// Sending chunks.
    Uploading,
    /// Every chunk acknowledged.
    Complete,
    /// Abandoned after exhausting retries.
    Error,
}

impl FileStatus {
    /// `true` for states that still require network attempts.
    pub fn needs_attempt(self) -> bool {
        matches!(self, Self::Pending | Self::Preparing | Self::Uploading)
    }

    /// `true` for `Complete` and `Error`.
    pub fn is_terminal(self) -> bool {
        !self.needs_attempt()
    }
}

/// Snapshot of a managed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub extension: String,
    pub total_chunks: u64,
    pub uploaded_chunks: u64,
    pub status: FileStatus,
    pub retries: u32,
    /// Whether a transport operation is currently outstanding.
    pub in_flight: bool,
}

/// Why a file was refused at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Empty, or larger than the configured maximum.
    Size,
    /// Extension not in the allow-list.
    Extension,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => f.write_str("size"),
            Self::Extension => f.write_str("extension"),
        }
    }
}

/// Lifecycle notification published by an uploader.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// An intake batch was processed. `rejected` counts every handle of the
    /// batch that was not accepted, for whatever reason.
    FilesAdded {
        accepted: Vec<FileInfo>,
        rejected: usize,
    },
    /// A file was refused at intake.
    FileRejected { file: FileInfo, reason: RejectReason },
    /// Session state changed; `fraction` is the value of `progress()`.
    Progress { fraction: f64 },
    /// A file was abandoned after exhausting its retries.
    FileError { file: FileInfo },
    /// No work remains. Every file is in exactly one list.
    SessionEnded {
        completed: Vec<FileInfo>,
        failed: Vec<FileInfo>,
    },
}
