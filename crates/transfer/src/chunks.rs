use std::ops::Range;

/// How a file of a given size splits into fixed-size chunks.
///
/// Every chunk is `chunk_size` bytes except possibly the last, which is
/// shorter. A non-empty file always has at least one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    size: u64,
    chunk_size: u64,
}

impl ChunkLayout {
    /// Creates a layout. `chunk_size` must be non-zero.
    pub fn new(size: u64, chunk_size: u64) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be non-zero");
        Self { size, chunk_size }
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `ceil(size / chunk_size)`.
    pub fn total_chunks(&self) -> u64 {
        self.size.div_ceil(self.chunk_size)
    }

    /// Byte range of the chunk following `uploaded_chunks` acknowledged ones:
    /// `[uploaded * chunk_size, min(size, (uploaded + 1) * chunk_size))`.
    pub fn next_range(&self, uploaded_chunks: u64) -> Range<u64> {
        let start = uploaded_chunks.saturating_mul(self.chunk_size).min(self.size);
        let end = start.saturating_add(self.chunk_size).min(self.size);
        start..end
    }

    /// Bytes covered by `uploaded_chunks` acknowledged chunks.
    pub fn bytes_for(&self, uploaded_chunks: u64) -> u64 {
        if uploaded_chunks >= self.total_chunks() {
            self.size
        } else {
            uploaded_chunks * self.chunk_size
        }
    }
}
