use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::LogLevel;

/// An append-only session log entry.
///
/// `seq` is monotonic within a session so a JSONL export can be replayed in
/// order even when timestamps collide.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LogEntry {
    pub session_id: String,
    pub seq: u32,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
