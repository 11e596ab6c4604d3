//! Session log persistence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_log_dir() -> String {
    ".lumen/migration-logs".to_string()
}

const fn default_retention_hours() -> u64 {
    72
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for per-session JSONL logs. Empty disables file output.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// How long finished sessions stay queryable in memory.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl LoggingConfig {
    /// Log directory, if file output is enabled.
    #[must_use]
    pub fn log_dir(&self) -> Option<PathBuf> {
        if self.log_dir.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.log_dir))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dir_disables_file_output() {
        let config = LoggingConfig {
            log_dir: "  ".into(),
            ..LoggingConfig::default()
        };
        assert!(config.log_dir().is_none());
        assert!(LoggingConfig::default().log_dir().is_some());
    }
}
