//! Cross-cutting error types for Lumen.
//!
//! Domain-specific errors (`DatabaseError`, `MigrationError`, `ConfigError`)
//! live in their respective crates. Errors crossing the store seam use
//! [`StoreError`] so the engine never depends on a concrete backend.

use thiserror::Error;

/// Errors that can be raised by any Lumen crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (schema, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The OS random source was unavailable while generating an ID.
    #[error("ID generation failed: {0}")]
    IdGeneration(String),
}

/// Errors returned by persistence adapters through the store traits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    /// The write collides with a uniqueness constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The guest profile was already committed to an account.
    #[error("guest {guest_id} already migrated to account {account_id}")]
    AlreadyCommitted { guest_id: String, account_id: String },

    /// Stored data could not be decoded into domain types.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}
