//! Error type for the migration engine.

use std::time::Duration;

use lum_core::enums::ErrorKind;
use lum_core::errors::{CoreError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Guest data was rejected before anything was written.
    #[error("{0}")]
    Validation(String),

    #[error("transformation failed: {0}")]
    Transformation(String),

    #[error("conflict resolution failed: {0}")]
    ConflictResolution(String),

    /// A store call failed and the failure could not be absorbed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Stored data does not match what the migration intended to write.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("rollback failed: {0}")]
    Rollback(String),

    /// The checkpoint was confirmed; compensation is no longer allowed.
    #[error("rollback window closed for checkpoint {0}")]
    RollbackWindowClosed(String),

    #[error("checkpoint {0} not found")]
    CheckpointNotFound(String),

    /// Another migration for the same guest is in flight.
    #[error("{0}")]
    Concurrency(String),

    #[error("migration exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("session {0} not found")]
    SessionNotFound(String),

    /// The session reached a terminal status and no longer accepts entries.
    #[error("session {0} is already closed")]
    SessionClosed(String),

    #[error("operation {0} is not open")]
    UnknownOperation(String),

    #[error("invalid phase transition for session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: String,
        from: String,
        to: String,
    },

    #[error("session log I/O failed: {0}")]
    LogIo(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl MigrationError {
    /// Classification used for rollback decisions and the wire `errorKind`.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transformation(_) => ErrorKind::Transformation,
            Self::ConflictResolution(_) => ErrorKind::ConflictResolution,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Rollback(_) | Self::RollbackWindowClosed(_) | Self::CheckpointNotFound(_) => {
                ErrorKind::Rollback
            }
            Self::Concurrency(_) => ErrorKind::Concurrency,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::SessionNotFound(_)
            | Self::SessionClosed(_)
            | Self::UnknownOperation(_)
            | Self::InvalidTransition { .. }
            | Self::LogIo(_)
            | Self::Core(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_drive_rollback_decisions() {
        assert!(!MigrationError::Validation("bad".into()).kind().requires_rollback());
        assert!(!MigrationError::Concurrency("busy".into()).kind().requires_rollback());
        assert!(
            MigrationError::Persistence(StoreError::Backend("down".into()))
                .kind()
                .requires_rollback()
        );
        assert_eq!(
            MigrationError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
    }
}
