use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::LogEntry;
use crate::enums::{MigrationPhase, SessionStatus};

/// Counters aggregated over a migration session's log stream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SessionMetrics {
    pub operations_attempted: u32,
    pub operations_succeeded: u32,
    pub operations_failed: u32,
    pub warnings: u32,
    pub errors: u32,
}

/// One migration attempt for a (guest, account) pair.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrationSession {
    pub id: String,
    pub guest_id: String,
    pub account_id: String,
    pub phase: MigrationPhase,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metrics: SessionMetrics,
}

/// Summary produced when a session reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub guest_id: String,
    pub account_id: String,
    pub status: SessionStatus,
    pub final_phase: MigrationPhase,
    pub duration_ms: u64,
    pub metrics: SessionMetrics,
    pub log_count: u32,
    pub summary: serde_json::Value,
}

/// Exportable audit report: the session plus its full log stream.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SessionReport {
    pub session: MigrationSession,
    pub summary: Option<SessionSummary>,
    pub entries: Vec<LogEntry>,
}
