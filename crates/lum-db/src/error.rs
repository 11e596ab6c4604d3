//! Database error types for lum-db.

use lum_core::errors::StoreError;
use thiserror::Error;

/// `SQLITE_CONSTRAINT`; extended codes keep it in the low byte.
const SQLITE_CONSTRAINT: i32 = 19;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The guest profile was already committed.
    #[error("guest {guest_id} already migrated to account {account_id}")]
    AlreadyCommitted { guest_id: String, account_id: String },

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DatabaseError> for StoreError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => Self::NotFound {
                entity_type: entity.to_string(),
                id,
            },
            DatabaseError::AlreadyCommitted {
                guest_id,
                account_id,
            } => Self::AlreadyCommitted {
                guest_id,
                account_id,
            },
            DatabaseError::LibSql(libsql::Error::SqliteFailure(code, msg))
                if code & 0xff == SQLITE_CONSTRAINT =>
            {
                Self::Constraint(msg)
            }
            DatabaseError::InvalidState(msg) => Self::Corrupt(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}
