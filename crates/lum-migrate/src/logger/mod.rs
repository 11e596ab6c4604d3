//! Per-session structured logging.
//!
//! Each migration session owns an append-only stream of [`LogEntry`] records
//! plus running metrics. Entries are mirrored to `tracing` and, when a log
//! directory is configured, appended to `{log_dir}/{session_id}.jsonl`.
//! Sessions stay queryable in memory until the retention window lapses.

pub mod writer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use lum_config::LoggingConfig;
use lum_core::entities::{LogEntry, MigrationSession, SessionMetrics, SessionReport, SessionSummary};
use lum_core::enums::{LogLevel, MigrationPhase, OperationType, SessionStatus};
use lum_core::ids::{PREFIX_OPERATION, PREFIX_SESSION, generate_id};
use serde_json::{Value, json};

use crate::error::MigrationError;
pub use writer::SessionLogWriter;

struct OpenOperation {
    op_type: OperationType,
    started_at: DateTime<Utc>,
}

struct SessionRecord {
    session: MigrationSession,
    entries: Vec<LogEntry>,
    summary: Option<SessionSummary>,
    operations: HashMap<String, OpenOperation>,
}

pub struct SessionLogger {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    writer: SessionLogWriter,
    retention: chrono::Duration,
    next_operation: AtomicU64,
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl SessionLogger {
    #[must_use]
    pub fn new(writer: SessionLogWriter, retention: chrono::Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            writer,
            retention,
            next_operation: AtomicU64::new(1),
        }
    }

    /// Build a logger from the `[logging]` config section.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::LogIo` if the log directory cannot be created.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, MigrationError> {
        let writer = match config.log_dir() {
            Some(dir) => SessionLogWriter::new(dir)?,
            None => SessionLogWriter::disabled(),
        };
        let hours = i64::try_from(config.retention_hours).unwrap_or(i64::MAX);
        let retention = chrono::Duration::try_hours(hours).unwrap_or(chrono::Duration::MAX);
        Ok(Self::new(writer, retention))
    }

    /// Logger without file output and a one-day retention window.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(SessionLogWriter::disabled(), chrono::Duration::days(1))
    }

    #[must_use]
    pub const fn writer(&self) -> &SessionLogWriter {
        &self.writer
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new active session in the `initialization` phase.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Core` if no session id can be generated.
    pub fn initialize_session(&self, guest_id: &str, account_id: &str) -> Result<String, MigrationError> {
        let id = generate_id(PREFIX_SESSION)?;
        let session = MigrationSession {
            id: id.clone(),
            guest_id: guest_id.to_string(),
            account_id: account_id.to_string(),
            phase: MigrationPhase::Initialization,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            completed_at: None,
            metrics: SessionMetrics::default(),
        };
        let mut sessions = self.lock();
        sessions.insert(
            id.clone(),
            SessionRecord {
                session,
                entries: Vec::new(),
                summary: None,
                operations: HashMap::new(),
            },
        );
        let record = sessions
            .get_mut(&id)
            .ok_or_else(|| MigrationError::SessionNotFound(id.clone()))?;
        self.push(
            record,
            LogLevel::Info,
            "migration session started".to_string(),
            json!({ "guest_id": guest_id, "account_id": account_id }),
        );
        Ok(id)
    }

    /// Append an entry, update metrics, mirror to tracing and disk.
    fn push(&self, record: &mut SessionRecord, level: LogLevel, message: String, metadata: Value) {
        let entry = LogEntry {
            session_id: record.session.id.clone(),
            seq: saturating_u32(record.entries.len() + 1),
            level,
            message,
            metadata,
            timestamp: Utc::now(),
        };
        match level {
            LogLevel::Info => {
                tracing::info!(session = %entry.session_id, seq = entry.seq, metadata = %entry.metadata, "{}", entry.message);
            }
            LogLevel::Warning => {
                record.session.metrics.warnings += 1;
                tracing::warn!(session = %entry.session_id, seq = entry.seq, metadata = %entry.metadata, "{}", entry.message);
            }
            LogLevel::Error => {
                record.session.metrics.errors += 1;
                tracing::error!(session = %entry.session_id, seq = entry.seq, metadata = %entry.metadata, "{}", entry.message);
            }
        }
        if let Err(e) = self.writer.append(&entry) {
            tracing::warn!(session = %entry.session_id, error = %e, "session log write failed");
        }
        record.entries.push(entry);
    }

    fn with_active<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&Self, &mut SessionRecord) -> Result<T, MigrationError>,
    ) -> Result<T, MigrationError> {
        let mut sessions = self.lock();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| MigrationError::SessionNotFound(session_id.to_string()))?;
        if record.session.status.is_terminal() {
            return Err(MigrationError::SessionClosed(session_id.to_string()));
        }
        f(self, record)
    }

    fn log(&self, session_id: &str, level: LogLevel, message: &str, metadata: Value) -> Result<(), MigrationError> {
        self.with_active(session_id, |this, record| {
            this.push(record, level, message.to_string(), metadata);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` or `SessionClosed`.
    pub fn log_info(&self, session_id: &str, message: &str, metadata: Value) -> Result<(), MigrationError> {
        self.log(session_id, LogLevel::Info, message, metadata)
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` or `SessionClosed`.
    pub fn log_warning(&self, session_id: &str, message: &str, metadata: Value) -> Result<(), MigrationError> {
        self.log(session_id, LogLevel::Warning, message, metadata)
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` or `SessionClosed`.
    pub fn log_error(&self, session_id: &str, message: &str, metadata: Value) -> Result<(), MigrationError> {
        self.log(session_id, LogLevel::Error, message, metadata)
    }

    /// Open a bracketed operation and return its id.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` or `SessionClosed`.
    pub fn log_operation_start(
        &self,
        session_id: &str,
        op_type: OperationType,
        data: Value,
    ) -> Result<String, MigrationError> {
        self.with_active(session_id, |this, record| {
            let n = this.next_operation.fetch_add(1, Ordering::Relaxed);
            let operation_id = format!("{PREFIX_OPERATION}-{:08x}", n & 0xffff_ffff);
            record.session.metrics.operations_attempted += 1;
            record.operations.insert(
                operation_id.clone(),
                OpenOperation {
                    op_type,
                    started_at: Utc::now(),
                },
            );
            this.push(
                record,
                LogLevel::Info,
                format!("{op_type} started"),
                json!({ "operation_id": operation_id, "operation_type": op_type, "data": data }),
            );
            Ok(operation_id)
        })
    }

    fn close_operation(
        record: &mut SessionRecord,
        operation_id: &str,
    ) -> Result<(OperationType, i64), MigrationError> {
        let op = record
            .operations
            .remove(operation_id)
            .ok_or_else(|| MigrationError::UnknownOperation(operation_id.to_string()))?;
        let elapsed = (Utc::now() - op.started_at).num_milliseconds().max(0);
        Ok((op.op_type, elapsed))
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound`, `SessionClosed`, or `UnknownOperation`.
    pub fn log_operation_success(
        &self,
        session_id: &str,
        operation_id: &str,
        result: Value,
    ) -> Result<(), MigrationError> {
        self.with_active(session_id, |this, record| {
            let (op_type, duration_ms) = Self::close_operation(record, operation_id)?;
            record.session.metrics.operations_succeeded += 1;
            this.push(
                record,
                LogLevel::Info,
                format!("{op_type} succeeded"),
                json!({
                    "operation_id": operation_id,
                    "operation_type": op_type,
                    "duration_ms": duration_ms,
                    "result": result,
                }),
            );
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound`, `SessionClosed`, or `UnknownOperation`.
    pub fn log_operation_failure(
        &self,
        session_id: &str,
        operation_id: &str,
        error: &str,
        data: Value,
    ) -> Result<(), MigrationError> {
        self.with_active(session_id, |this, record| {
            let (op_type, duration_ms) = Self::close_operation(record, operation_id)?;
            record.session.metrics.operations_failed += 1;
            this.push(
                record,
                LogLevel::Error,
                format!("{op_type} failed: {error}"),
                json!({
                    "operation_id": operation_id,
                    "operation_type": op_type,
                    "duration_ms": duration_ms,
                    "error": error,
                    "data": data,
                }),
            );
            Ok(())
        })
    }

    /// Close every operation still open on the session as a failure marked
    /// `abandoned`, oldest first. Returns how many were closed.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` or `SessionClosed`.
    pub fn abandon_open_operations(&self, session_id: &str, reason: &str) -> Result<usize, MigrationError> {
        self.with_active(session_id, |this, record| {
            let mut open: Vec<(String, OpenOperation)> = record.operations.drain().collect();
            open.sort_by(|a, b| a.1.started_at.cmp(&b.1.started_at).then_with(|| a.0.cmp(&b.0)));
            let now = Utc::now();
            for (operation_id, op) in &open {
                record.session.metrics.operations_failed += 1;
                this.push(
                    record,
                    LogLevel::Error,
                    format!("{} abandoned: {reason}", op.op_type),
                    json!({
                        "operation_id": operation_id,
                        "operation_type": op.op_type,
                        "duration_ms": (now - op.started_at).num_milliseconds().max(0),
                        "error": reason,
                        "abandoned": true,
                    }),
                );
            }
            Ok(open.len())
        })
    }

    /// Move the session to `phase`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the phase machine forbids the move.
    pub fn update_migration_phase(&self, session_id: &str, phase: MigrationPhase) -> Result<(), MigrationError> {
        self.with_active(session_id, |this, record| {
            let from = record.session.phase;
            if !from.can_transition_to(phase) {
                return Err(MigrationError::InvalidTransition {
                    session_id: session_id.to_string(),
                    from: from.to_string(),
                    to: phase.to_string(),
                });
            }
            record.session.phase = phase;
            this.push(
                record,
                LogLevel::Info,
                format!("phase {phase}"),
                json!({ "from": from, "to": phase }),
            );
            Ok(())
        })
    }

    /// Close the session with a terminal status.
    ///
    /// `failed` and `rolled_back` also move the phase to the matching
    /// terminal phase; `completed` requires the `completion` phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a non-terminal status or a completion
    /// outside the `completion` phase.
    pub fn complete_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        summary: Value,
    ) -> Result<SessionSummary, MigrationError> {
        self.with_active(session_id, |this, record| {
            let invalid = |from: String| MigrationError::InvalidTransition {
                session_id: session_id.to_string(),
                from,
                to: status.to_string(),
            };
            if !record.session.status.can_transition_to(status) {
                return Err(invalid(record.session.status.to_string()));
            }
            let final_phase = match status {
                SessionStatus::Completed if record.session.phase == MigrationPhase::Completion => {
                    MigrationPhase::Completion
                }
                SessionStatus::Failed => MigrationPhase::Failed,
                SessionStatus::RolledBack => MigrationPhase::RolledBack,
                SessionStatus::Completed | SessionStatus::Active => {
                    return Err(invalid(record.session.phase.to_string()));
                }
            };
            let now = Utc::now();
            record.session.phase = final_phase;
            this.push(
                record,
                if status == SessionStatus::Completed {
                    LogLevel::Info
                } else {
                    LogLevel::Error
                },
                format!("migration session {status}"),
                summary.clone(),
            );
            record.session.status = status;
            record.session.completed_at = Some(now);

            let duration_ms = (now - record.session.started_at).num_milliseconds().max(0);
            let result = SessionSummary {
                session_id: session_id.to_string(),
                guest_id: record.session.guest_id.clone(),
                account_id: record.session.account_id.clone(),
                status,
                final_phase,
                duration_ms: u64::try_from(duration_ms).unwrap_or(0),
                metrics: record.session.metrics,
                log_count: saturating_u32(record.entries.len()),
                summary,
            };
            record.summary = Some(result.clone());
            record.operations.clear();
            Ok(result)
        })
    }

    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<MigrationSession> {
        self.lock().get(session_id).map(|r| r.session.clone())
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for unknown or pruned sessions.
    pub fn entries(&self, session_id: &str) -> Result<Vec<LogEntry>, MigrationError> {
        self.lock()
            .get(session_id)
            .map(|r| r.entries.clone())
            .ok_or_else(|| MigrationError::SessionNotFound(session_id.to_string()))
    }

    /// Session, summary, and full log stream in one exportable document.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for unknown or pruned sessions.
    pub fn export_report(&self, session_id: &str) -> Result<SessionReport, MigrationError> {
        self.lock()
            .get(session_id)
            .map(|r| SessionReport {
                session: r.session.clone(),
                summary: r.summary.clone(),
                entries: r.entries.clone(),
            })
            .ok_or_else(|| MigrationError::SessionNotFound(session_id.to_string()))
    }

    /// Forget terminal sessions that finished before the retention window.
    /// Returns how many were dropped. Files on disk are kept.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return 0;
        };
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, r| r.session.completed_at.is_none_or(|at| at > cutoff));
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired migration sessions pruned");
        }
        pruned
    }
}
