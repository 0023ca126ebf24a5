//! The set of files under management.

use std::sync::Arc;
use std::time::SystemTime;

use resup_protocol::{file_extension, file_id};
use resup_transfer::{ChunkLayout, FileHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::UploaderConfig;
use crate::types::{FileInfo, FileStatus, RejectReason};

/// Custom acceptance predicate applied after the size and extension checks.
pub type Validator = Arc<dyn Fn(&FileInfo) -> bool + Send + Sync>;

/// An outstanding transport operation.
#[derive(Debug)]
pub(crate) struct InFlight {
    /// Session-unique attempt number; settlements carrying another number
    /// belong to an aborted attempt and are ignored.
    pub(crate) attempt: u64,
    pub(crate) cancel: CancellationToken,
    /// Fraction of the current chunk sent, in `[0, 1]`.
    pub(crate) fraction: f64,
    /// Bytes of the current chunk sent.
    pub(crate) bytes: u64,
}

/// A managed file and its transfer state.
pub(crate) struct FileEntry {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) extension: String,
    pub(crate) layout: ChunkLayout,
    pub(crate) handle: Arc<dyn FileHandle>,
    pub(crate) uploaded_chunks: u64,
    pub(crate) status: FileStatus,
    pub(crate) retries: u32,
    pub(crate) in_flight: Option<InFlight>,
}

impl FileEntry {
    pub(crate) fn new(handle: Arc<dyn FileHandle>, chunk_size: u64, now: SystemTime) -> Self {
        let name = handle.name().to_string();
        let size = handle.size();
        Self {
            id: file_id(size, handle.last_modified(), &name, now),
            extension: file_extension(&name),
            layout: ChunkLayout::new(size, chunk_size),
            name,
            handle,
            uploaded_chunks: 0,
            status: FileStatus::Pending,
            retries: 0,
            in_flight: None,
        }
    }

    pub(crate) fn size(&self) -> u64 {
        self.layout.size()
    }

    pub(crate) fn total_chunks(&self) -> u64 {
        self.layout.total_chunks()
    }

    /// Cancels the outstanding operation, if any. Retries and status are
    /// left untouched.
    pub(crate) fn abort(&mut self) -> bool {
        match self.in_flight.take() {
            Some(op) => {
                op.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `attempt` is the outstanding operation.
    pub(crate) fn owns_attempt(&self, attempt: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|op| op.attempt == attempt)
    }

    pub(crate) fn info(&self) -> FileInfo {
        FileInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size(),
            extension: self.extension.clone(),
            total_chunks: self.total_chunks(),
            uploaded_chunks: self.uploaded_chunks,
            status: self.status,
            retries: self.retries,
            in_flight: self.in_flight.is_some(),
        }
    }
}

/// Result of screening an intake batch.
pub(crate) struct Screening {
    pub(crate) accepted: Vec<FileEntry>,
    pub(crate) rejections: Vec<(FileInfo, RejectReason)>,
}

/// Ordered collection of managed files. Insertion order is scheduling order.
#[derive(Default)]
pub(crate) struct FileRegistry {
    files: Vec<FileEntry>,
}

impl FileRegistry {
    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileEntry> {
        self.files.iter_mut()
    }

    pub(crate) fn find(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|f| f.id == id)
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.files.iter().filter(|f| f.in_flight.is_some()).count()
    }

    pub(crate) fn append(&mut self, entries: Vec<FileEntry>) {
        self.files.extend(entries);
    }

    /// Aborts and removes a file.
    pub(crate) fn remove(&mut self, id: &str) -> Option<FileEntry> {
        let pos = self.files.iter().position(|f| f.id == id)?;
        let mut entry = self.files.remove(pos);
        entry.abort();
        Some(entry)
    }

    /// Builds entries for `handles` and applies the intake rules, without
    /// modifying the registry.
    ///
    /// - duplicates of a managed (or earlier accepted) id are skipped
    /// - size, then extension, failures are reported per file
    /// - the custom validator runs last; its rejections are silent
    /// - single-file mode accepts one file; otherwise intake stops once
    ///   `max_files` would be exceeded
    pub(crate) fn screen(
        &self,
        handles: Vec<Arc<dyn FileHandle>>,
        config: &UploaderConfig,
        validator: Option<&Validator>,
        now: SystemTime,
    ) -> Screening {
        let mut accepted: Vec<FileEntry> = Vec::new();
        let mut rejections = Vec::new();

        for handle in handles {
            if self.limit_reached(config, accepted.len()) {
                break;
            }

            let entry = FileEntry::new(handle, config.chunk_size, now);
            if self.find(&entry.id).is_some() || accepted.iter().any(|a| a.id == entry.id) {
                debug!(file = %entry.id, "skipping duplicate file");
                continue;
            }

            if !config.accepts_size(entry.size()) {
                rejections.push((entry.info(), RejectReason::Size));
                continue;
            }
            if !config.accepts_extension(&entry.extension) {
                rejections.push((entry.info(), RejectReason::Extension));
                continue;
            }
            if let Some(validator) = validator
                && !validator(&entry.info())
            {
                debug!(file = %entry.id, "file refused by validator");
                continue;
            }

            accepted.push(entry);
        }

        Screening {
            accepted,
            rejections,
        }
    }

    fn limit_reached(&self, config: &UploaderConfig, accepted: usize) -> bool {
        match config.max_files {
            Some(1) => accepted > 0,
            Some(max) => self.files.len() + accepted >= max,
            None => false,
        }
    }
}
