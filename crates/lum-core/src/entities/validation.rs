use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{EntityType, ValidationStage};

/// Outcome of one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ValidationReport {
    pub stage: ValidationStage,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Weighted pass rate over all checks, 0–100.
    pub integrity_score: u8,
    pub checks_run: u32,
    pub checks_passed: u32,
}

/// A single discrepancy found by the integrity check.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct IntegrityIssue {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub problem: IntegrityProblem,
}

/// What went wrong with an entity between source and migrated state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityProblem {
    /// Present in source, absent after migration.
    Missing,
    /// Present on both sides with different content.
    Altered,
    /// Present after migration but never planned.
    Unexpected,
    /// Aggregate counts disagree.
    CountMismatch,
}

/// Result of cross-checking the expected state against the stored state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct IntegrityCheck {
    pub session_id: String,
    pub integrity_score: u8,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityCheck {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
