//! Status enums, phases, strategies, and entity types for Lumen.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Enums with state machines provide `allowed_next_states()` so the engine can
//! refuse illegal transitions instead of trusting call order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Self-reported difficulty of a flashcard.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReviewOrder
// ---------------------------------------------------------------------------

/// Order in which due flashcards are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOrder {
    Sequential,
    Random,
    #[default]
    SpacedRepetition,
}

impl ReviewOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
            Self::SpacedRepetition => "spaced_repetition",
        }
    }
}

impl fmt::Display for ReviewOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MigrationPhase
// ---------------------------------------------------------------------------

/// Phase of a guest-to-account migration.
///
/// ```text
/// initialization → validation → checkpoint_creation → transformation
///   → conflict_resolution → migration → verification → completion
///
/// any non-terminal phase → failed
///                        → rolled_back
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Initialization,
    Validation,
    CheckpointCreation,
    Transformation,
    ConflictResolution,
    Migration,
    Verification,
    Completion,
    RolledBack,
    Failed,
}

impl MigrationPhase {
    /// Forward phases in execution order.
    pub const FORWARD: [Self; 8] = [
        Self::Initialization,
        Self::Validation,
        Self::CheckpointCreation,
        Self::Transformation,
        Self::ConflictResolution,
        Self::Migration,
        Self::Verification,
        Self::Completion,
    ];

    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Initialization => &[Self::Validation, Self::Failed, Self::RolledBack],
            Self::Validation => &[Self::CheckpointCreation, Self::Failed, Self::RolledBack],
            Self::CheckpointCreation => &[Self::Transformation, Self::Failed, Self::RolledBack],
            Self::Transformation => &[Self::ConflictResolution, Self::Failed, Self::RolledBack],
            Self::ConflictResolution => &[Self::Migration, Self::Failed, Self::RolledBack],
            Self::Migration => &[Self::Verification, Self::Failed, Self::RolledBack],
            Self::Verification => &[Self::Completion, Self::Failed, Self::RolledBack],
            Self::Completion | Self::RolledBack | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completion | Self::RolledBack | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Validation => "validation",
            Self::CheckpointCreation => "checkpoint_creation",
            Self::Transformation => "transformation",
            Self::ConflictResolution => "conflict_resolution",
            Self::Migration => "migration",
            Self::Verification => "verification",
            Self::Completion => "completion",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Status of a migration session.
///
/// ```text
/// active → completed
///        → failed
///        → rolled_back
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    RolledBack,
}

impl SessionStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Completed, Self::Failed, Self::RolledBack],
            Self::Completed | Self::Failed | Self::RolledBack => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConflictStrategy
// ---------------------------------------------------------------------------

/// Policy governing how colliding guest and account records are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    MergeWithPreference,
    GuestPriority,
    ExistingPriority,
    CreateDuplicate,
}

impl ConflictStrategy {
    pub const ALL: [Self; 4] = [
        Self::MergeWithPreference,
        Self::GuestPriority,
        Self::ExistingPriority,
        Self::CreateDuplicate,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergeWithPreference => "merge_with_preference",
            Self::GuestPriority => "guest_priority",
            Self::ExistingPriority => "existing_priority",
            Self::CreateDuplicate => "create_duplicate",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "unknown conflict resolution strategy '{s}' (expected one of: merge_with_preference, guest_priority, existing_priority, create_duplicate)"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Kind of migratable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Curriculum,
    Module,
    Lesson,
    Flashcard,
    Progress,
    Preferences,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Curriculum => "curriculum",
            Self::Module => "module",
            Self::Lesson => "lesson",
            Self::Flashcard => "flashcard",
            Self::Progress => "progress",
            Self::Preferences => "preferences",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// Bracketed operation recorded by the session logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    ValidateGuestData,
    CreateCheckpoint,
    Transform,
    ValidateTransformed,
    ResolveConflicts,
    WriteCurriculum,
    WriteFlashcard,
    WriteProgress,
    WritePreferences,
    CommitGuest,
    VerifyResults,
    IntegrityCheck,
    Rollback,
    CompensatingDelete,
    CompensatingRestore,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidateGuestData => "validate_guest_data",
            Self::CreateCheckpoint => "create_checkpoint",
            Self::Transform => "transform",
            Self::ValidateTransformed => "validate_transformed",
            Self::ResolveConflicts => "resolve_conflicts",
            Self::WriteCurriculum => "write_curriculum",
            Self::WriteFlashcard => "write_flashcard",
            Self::WriteProgress => "write_progress",
            Self::WritePreferences => "write_preferences",
            Self::CommitGuest => "commit_guest",
            Self::VerifyResults => "verify_results",
            Self::IntegrityCheck => "integrity_check",
            Self::Rollback => "rollback",
            Self::CompensatingDelete => "compensating_delete",
            Self::CompensatingRestore => "compensating_restore",
        }
    }

    /// Whether the operation mutates the target account.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::WriteCurriculum
                | Self::WriteFlashcard
                | Self::WriteProgress
                | Self::WritePreferences
                | Self::CommitGuest
                | Self::CompensatingDelete
                | Self::CompensatingRestore
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidationStage
// ---------------------------------------------------------------------------

/// Point in the migration at which a validation report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    PreMigration,
    PostTransformation,
    PostMigration,
}

impl ValidationStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreMigration => "pre_migration",
            Self::PostTransformation => "post_transformation",
            Self::PostMigration => "post_migration",
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Classification of a migration failure.
///
/// The orchestrator decides whether to roll back from the kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transformation,
    ConflictResolution,
    Persistence,
    Integrity,
    Rollback,
    Concurrency,
    Timeout,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::ConflictResolution => "conflict_resolution",
            Self::Persistence => "persistence",
            Self::Integrity => "integrity",
            Self::Rollback => "rollback",
            Self::Concurrency => "concurrency",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Whether a failure of this kind must be compensated when a checkpoint exists.
    ///
    /// Validation and concurrency failures are raised before anything is
    /// written; every other kind may leave partial writes behind.
    #[must_use]
    pub const fn requires_rollback(self) -> bool {
        !matches!(self, Self::Validation | Self::Concurrency)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_phases_only_move_forward() {
        for window in MigrationPhase::FORWARD.windows(2) {
            let (from, to) = (window[0], window[1]);
            assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
            assert!(!to.can_transition_to(from), "{to} -> {from} should be rejected");
        }
    }

    #[test]
    fn failure_states_reachable_from_every_non_terminal_phase() {
        for phase in MigrationPhase::FORWARD {
            if phase.is_terminal() {
                assert!(phase.allowed_next_states().is_empty());
                continue;
            }
            assert!(phase.can_transition_to(MigrationPhase::Failed));
            assert!(phase.can_transition_to(MigrationPhase::RolledBack));
        }
        assert!(MigrationPhase::RolledBack.allowed_next_states().is_empty());
        assert!(MigrationPhase::Failed.allowed_next_states().is_empty());
    }

    #[test]
    fn phases_cannot_skip_ahead() {
        assert!(!MigrationPhase::Validation.can_transition_to(MigrationPhase::Migration));
        assert!(!MigrationPhase::Initialization.can_transition_to(MigrationPhase::Completion));
    }

    #[test]
    fn session_status_is_immutable_once_terminal() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Completed));
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::RolledBack,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(SessionStatus::Active));
        }
    }

    #[test]
    fn strategy_parses_cli_spellings() {
        assert_eq!(
            "merge-with-preference".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::MergeWithPreference
        );
        assert_eq!(
            " GUEST_PRIORITY ".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::GuestPriority
        );
        assert!("newest_wins".parse::<ConflictStrategy>().is_err());
    }

    #[test]
    fn strategy_defaults_to_merge() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::MergeWithPreference);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&MigrationPhase::CheckpointCreation).unwrap();
        assert_eq!(json, "\"checkpoint_creation\"");
        let strategy: ConflictStrategy = serde_json::from_str("\"create_duplicate\"").unwrap();
        assert_eq!(strategy, ConflictStrategy::CreateDuplicate);
    }

    #[test]
    fn pre_write_error_kinds_skip_rollback() {
        assert!(!ErrorKind::Validation.requires_rollback());
        assert!(!ErrorKind::Concurrency.requires_rollback());
        assert!(ErrorKind::Integrity.requires_rollback());
        assert!(ErrorKind::Timeout.requires_rollback());
    }
}
