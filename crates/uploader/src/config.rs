//! Session configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use resup_protocol::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_INPUT_NAME, DEFAULT_MAX_REQUESTS, RESUME_QUERY_TIMEOUT,
};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::retry::DEFAULT_MAX_RETRIES;

/// Tunables for one upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Bytes per chunk.
    pub chunk_size: u64,
    /// Maximum outstanding transport operations.
    pub max_requests: usize,
    /// Maximum managed files. `1` switches to single-file mode, where a new
    /// file replaces the current one.
    pub max_files: Option<usize>,
    /// Largest accepted file size in bytes.
    pub max_file_size: Option<u64>,
    /// Accepted extensions, compared case-insensitively.
    pub extensions: Option<Vec<String>>,
    /// Constant parameters sent with every request.
    pub query: BTreeMap<String, String>,
    /// Multipart field carrying the chunk bytes.
    pub input_name: String,
    pub query_timeout_ms: u64,
    /// Retries tolerated before a file is abandoned.
    pub max_retries: u32,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_files: None,
            max_file_size: None,
            extensions: None,
            query: BTreeMap::new(),
            input_name: DEFAULT_INPUT_NAME.to_string(),
            query_timeout_ms: RESUME_QUERY_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl UploaderConfig {
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.max_requests == 0 {
            return Err(UploadError::InvalidConfig("max_requests must be > 0".into()));
        }
        if self.max_files == Some(0) {
            return Err(UploadError::InvalidConfig("max_files must be > 0".into()));
        }
        if self.input_name.is_empty() {
            return Err(UploadError::InvalidConfig("input_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// `true` when at most one file is managed at a time.
    pub fn single_file(&self) -> bool {
        self.max_files == Some(1)
    }

    pub(crate) fn accepts_extension(&self, extension: &str) -> bool {
        match &self.extensions {
            Some(allowed) => allowed.iter().any(|e| e.eq_ignore_ascii_case(extension)),
            None => true,
        }
    }

    pub(crate) fn accepts_size(&self, size: u64) -> bool {
        size > 0 && self.max_file_size.is_none_or(|max| size <= max)
    }
}
