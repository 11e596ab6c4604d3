//! ID prefix constants and generation helpers.
//!
//! Every engine-generated identifier is `{prefix}-{8 hex chars}`, e.g.
//! `mig-a3f8b2c1`. Domain entity ids (curricula, flashcards, ...) come from the
//! guest client and are never rewritten except for collision suffixes.

use crate::errors::CoreError;

/// Migration session.
pub const PREFIX_SESSION: &str = "mig";
/// Checkpoint.
pub const PREFIX_CHECKPOINT: &str = "chk";
/// Bracketed operation in the session log.
pub const PREFIX_OPERATION: &str = "opr";
/// Commit receipt issued by the store.
pub const PREFIX_COMMIT: &str = "cmt";

pub const ALL_PREFIXES: [&str; 4] = [
    PREFIX_SESSION,
    PREFIX_CHECKPOINT,
    PREFIX_OPERATION,
    PREFIX_COMMIT,
];

/// Generate a prefixed ID such as `"chk-0b9e44d1"`.
///
/// # Errors
///
/// Returns `CoreError::IdGeneration` if the OS random source fails.
pub fn generate_id(prefix: &str) -> Result<String, CoreError> {
    let mut bytes = [0u8; 4];
    getrandom::fill(&mut bytes).map_err(|e| CoreError::IdGeneration(e.to_string()))?;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("{prefix}-{hex}"))
}

/// Check that `id` is `{prefix}-{8 hex chars}`.
#[must_use]
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| hex.len() == 8 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
