//! Harness configuration
//!
//! Controls where retained temp files are created, how they are named, and
//! the default log filter. Every field has a default so an empty TOML
//! document is a valid configuration.

use crate::error::{Result, TestkitError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix used for every temp file the harness creates
pub const DEFAULT_TEMP_PREFIX: &str = "vagrant-unit";

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Configuration for the unit test harness
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestkitConfig {
    /// File name prefix for retained temp files
    pub temp_prefix: String,
    /// Optional file name suffix (e.g. an extension)
    pub temp_suffix: Option<String>,
    /// Directory for temp files; `None` uses the host temp directory
    pub temp_dir: Option<PathBuf>,
    /// Fallback `tracing` filter directive
    pub log_filter: String,
}

impl Default for TestkitConfig {
    fn default() -> Self {
        Self {
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            temp_suffix: None,
            temp_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TestkitConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TestkitError::config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TestkitError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Use a different temp file prefix
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Append a suffix to temp file names
    pub fn with_temp_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_suffix = Some(suffix.into());
        self
    }

    /// Create temp files under `dir` instead of the host temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Override the fallback log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Directory temp files will be created in
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
