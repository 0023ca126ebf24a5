//! Aggregate progress over the managed files.
//!
//! Abandoned files are excluded from both numerator and denominator.

use crate::registry::{FileEntry, FileRegistry};
use crate::types::FileStatus;

fn counted(registry: &FileRegistry) -> impl Iterator<Item = &FileEntry> {
    registry.iter().filter(|f| f.status != FileStatus::Error)
}

/// Chunk-weighted completion in `[0, 1]`, including the fraction of chunks
/// currently being written. `0` when nothing is counted.
pub(crate) fn progress(registry: &FileRegistry) -> f64 {
    let (done, total) = counted(registry).fold((0.0, 0u64), |(done, total), f| {
        let live = f.in_flight.as_ref().map_or(0.0, |op| op.fraction);
        let chunks = (f.uploaded_chunks as f64 + live).min(f.total_chunks() as f64);
        (done + chunks, total + f.total_chunks())
    });
    if total == 0 {
        return 0.0;
    }
    done / total as f64
}

/// Byte-weighted completion used for time estimates, or `None` while any
/// counted file has not learned its resume point yet.
pub(crate) fn completion_fraction(registry: &FileRegistry) -> Option<f64> {
    let mut done = 0u64;
    let mut total = 0u64;
    for f in counted(registry) {
        if matches!(f.status, FileStatus::Pending | FileStatus::Preparing) {
            return None;
        }
        let acked = f.layout.bytes_for(f.uploaded_chunks);
        let live = f.in_flight.as_ref().map_or(0, |op| op.bytes);
        done += (acked + live).min(f.size());
        total += f.size();
    }
    if total == 0 {
        return None;
    }
    Some(done as f64 / total as f64)
}
