//! Wire protocol for resumable chunked uploads.
//!
//! A session talks to a single endpoint with two request kinds:
//!
//! 1. **Resume query**: `GET` carrying the file identifier, name and size.
//!    The server answers with the number of chunks it already stores.
//! 2. **Chunk write**: multipart `POST` carrying the file identifier, the
//!    1-based chunk number and the chunk bytes. The server answers with the
//!    number of chunks stored after the write.
//!
//! Both answers are a bare unsigned decimal integer in a `200` body.

pub mod constants;
pub mod identity;
pub mod messages;
pub mod response;

pub use identity::{TIMESTAMP_FRESHNESS_WINDOW, escape_name, file_extension, file_id};
pub use messages::{ChunkWrite, ResumeQuery};
pub use response::{ProtocolError, parse_chunk_count};
