//! Configuration types for vmsched

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{SchedError, SchedResult};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VmschedConfig {
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl VmschedConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> SchedResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchedError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> SchedResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// New instances are placed on a host chosen at random from the N best
    /// weighed hosts. A value of 1 always picks the best host. Values below
    /// 1 are treated as 1.
    pub host_subset_size: i64,
    /// JSON file with free-form options handed to filters. Re-read when
    /// the file changes.
    pub json_config_location: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            host_subset_size: 1,
            json_config_location: None,
        }
    }
}

impl SchedulerConfig {
    /// Subset size to draw from for a weighed list of `weighed_len` hosts.
    ///
    /// Clamped to `1..=weighed_len`; an empty list still yields 1.
    pub fn effective_subset_size(&self, weighed_len: usize) -> usize {
        let configured = usize::try_from(self.host_subset_size).unwrap_or(0);
        configured.min(weighed_len).max(1)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}
