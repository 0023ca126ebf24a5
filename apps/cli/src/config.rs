//! CLI configuration file.
//!
//! Stored as TOML, by default at `~/.config/resup/config.toml`:
//!
//! ```toml
//! [upload]
//! chunk_size = 4194304
//! max_requests = 4
//!
//! [upload.query]
//! token = "..."
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use resup_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Uploader tunables; anything omitted keeps its default.
    #[serde(default)]
    pub upload: UploaderConfig,
}

impl CliConfig {
    /// Parses a configuration file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Loads the configuration.
    ///
    /// An explicit path must exist and parse. The default file is optional;
    /// if it is unreadable the defaults are used.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let Some(path) = default_path().filter(|p| p.exists()) else {
            return Ok(Self::default());
        };
        match Self::from_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }
}

/// `$XDG_CONFIG_HOME/resup/config.toml`, falling back to `~/.config`.
fn default_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("resup").join("config.toml"))
}
