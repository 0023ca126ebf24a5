//! Parameter names and protocol defaults.

use std::time::Duration;

/// Stable file identifier, sent with every request.
pub const PARAM_FILE_ID: &str = "resup_file_id";

/// Declared file name, sent with the resume query.
pub const PARAM_FILE_NAME: &str = "resup_file_name";

/// Declared file size in bytes, sent with the resume query.
pub const PARAM_FILE_SIZE: &str = "resup_file_size";

/// 1-based chunk sequence number, sent with a chunk write.
pub const PARAM_CHUNK_NUMBER: &str = "resup_chunk_number";

/// Cache-busting parameter appended to resume queries.
pub const PARAM_CACHE_BUST: &str = "_";

/// Default multipart field carrying the chunk bytes.
pub const DEFAULT_INPUT_NAME: &str = "resup_chunk";

/// File name attached to the binary multipart part.
pub const CHUNK_PART_FILE_NAME: &str = "blob";

/// Content type of the binary multipart part.
pub const CHUNK_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default number of concurrent in-flight requests per session.
pub const DEFAULT_MAX_REQUESTS: usize = 3;

/// Timeout applied to resume queries. Chunk writes have none.
pub const RESUME_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameter names owned by the protocol. Extra session parameters with
/// one of these names are overridden.
pub const RESERVED_PARAMS: [&str; 4] = [
    PARAM_FILE_ID,
    PARAM_FILE_NAME,
    PARAM_FILE_SIZE,
    PARAM_CHUNK_NUMBER,
];

/// Returns `true` if `name` is a protocol-owned parameter.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}
