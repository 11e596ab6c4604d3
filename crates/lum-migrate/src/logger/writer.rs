//! JSONL session log writer.
//!
//! Appends `LogEntry` records to per-session `{log_dir}/{session_id}.jsonl`
//! files with `serde_jsonlines::append_json_lines`, one line per entry.

use std::io;
use std::path::{Path, PathBuf};

use lum_core::entities::LogEntry;

/// Appends session log entries to per-session JSONL files.
pub struct SessionLogWriter {
    log_dir: PathBuf,
    enabled: bool,
}

impl SessionLogWriter {
    /// Create a writer for `log_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn new(log_dir: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&log_dir)?;
        Ok(Self {
            log_dir,
            enabled: true,
        })
    }

    /// A writer that keeps nothing on disk.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            log_dir: PathBuf::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File path for a session's log.
    #[must_use]
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.log_dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one entry to its session's file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write fails.
    pub fn append(&self, entry: &LogEntry) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        serde_jsonlines::append_json_lines(self.path_for(&entry.session_id), [entry])
    }

    /// Read back every entry written for `session_id`, in file order.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file is missing or a line does not parse.
    pub fn read(&self, session_id: &str) -> io::Result<Vec<LogEntry>> {
        serde_jsonlines::json_lines(self.path_for(session_id))?.collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lum_core::enums::LogLevel;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn entry(seq: u32) -> LogEntry {
        LogEntry {
            session_id: "mig-0000abcd".into(),
            seq,
            level: LogLevel::Info,
            message: format!("entry {seq}"),
            metadata: json!({"n": seq}),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn appends_one_line_per_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = SessionLogWriter::new(dir.path().join("logs")).unwrap();

        let entries = vec![entry(1), entry(2)];
        for e in &entries {
            writer.append(e).unwrap();
        }

        let raw = std::fs::read_to_string(writer.path_for("mig-0000abcd")).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert_eq!(writer.read("mig-0000abcd").unwrap(), entries);
    }

    #[test]
    fn disabled_writer_touches_nothing() {
        let writer = SessionLogWriter::disabled();
        assert!(!writer.is_enabled());
        writer.append(&entry(1)).unwrap();
        assert!(writer.read("mig-0000abcd").is_err());
    }
}
