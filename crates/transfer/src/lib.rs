//! File handles, chunk layout and ETA estimation for resumable uploads.

mod chunks;
mod progress;
mod source;

pub use chunks::ChunkLayout;
pub use progress::EtaAnchor;
pub use source::{FileHandle, LocalFile, MemoryFile, ReadFuture};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid byte range {start}..{end} for file of {size} bytes")]
    InvalidRange { start: u64, end: u64, size: u64 },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
