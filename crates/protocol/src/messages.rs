//! Request shapes for the two protocol operations.

use std::collections::BTreeMap;

use crate::constants::{
    PARAM_CACHE_BUST, PARAM_CHUNK_NUMBER, PARAM_FILE_ID, PARAM_FILE_NAME, PARAM_FILE_SIZE,
    is_reserved,
};

/// Asks the server how many chunks of a file it already stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeQuery {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
}

impl ResumeQuery {
    /// Builds the query parameters: extra session parameters first, then the
    /// protocol parameters, then the cache-busting timestamp.
    pub fn params(&self, extra: &BTreeMap<String, String>, cache_bust: u64) -> Vec<(String, String)> {
        let mut params = extra_params(extra);
        params.push((PARAM_FILE_ID.into(), self.file_id.clone()));
        params.push((PARAM_FILE_NAME.into(), self.file_name.clone()));
        params.push((PARAM_FILE_SIZE.into(), self.file_size.to_string()));
        params.push((PARAM_CACHE_BUST.into(), cache_bust.to_string()));
        params
    }
}

/// Uploads exactly one chunk of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWrite {
    pub file_id: String,
    /// 1-based: the first chunk is number 1.
    pub chunk_number: u64,
    /// Multipart field name carrying `data`.
    pub field_name: String,
    pub data: Vec<u8>,
}

impl ChunkWrite {
    /// Builds the text fields of the multipart body: extra session
    /// parameters, then the file id and chunk number.
    pub fn fields(&self, extra: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let mut fields = extra_params(extra);
        fields.push((PARAM_FILE_ID.into(), self.file_id.clone()));
        fields.push((PARAM_CHUNK_NUMBER.into(), self.chunk_number.to_string()));
        fields
    }
}

fn extra_params(extra: &BTreeMap<String, String>) -> Vec<(String, String)> {
    extra
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
