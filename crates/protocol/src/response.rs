//! Parsing of server responses.

/// A `200` response whose body is not a usable chunk count.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed chunk count: {0:?}")]
    MalformedCount(String),

    #[error("chunk count {reported} exceeds total chunks {total}")]
    CountOutOfRange { reported: u64, total: u64 },
}

/// Parses a response body that must be exactly an unsigned decimal integer
/// no greater than `total_chunks`.
///
/// No whitespace, sign or leading `+` is tolerated.
pub fn parse_chunk_count(body: &str, total_chunks: u64) -> Result<u64, ProtocolError> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::MalformedCount(truncate(body)));
    }
    let reported: u64 = body
        .parse()
        .map_err(|_| ProtocolError::MalformedCount(truncate(body)))?;
    if reported > total_chunks {
        return Err(ProtocolError::CountOutOfRange {
            reported,
            total: total_chunks,
        });
    }
    Ok(reported)
}

fn truncate(body: &str) -> String {
    body.chars().take(64).collect()
}
