//! Wire envelopes for the migration entrypoint.
//!
//! Shapes returned by `lum serve` (`POST /migrate`,
//! `GET /guests/{id}/eligibility`) and by `lum migrate --format json`.
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{GuestDataset, GuestUsageStats, IntegrityCheck, ValidationReport};
use crate::enums::{ConflictStrategy, ErrorKind};

/// Body of `POST /migrate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrateRequest {
    pub guest_id: String,
    pub account_id: String,
    pub guest_data: GuestDataset,
    #[serde(default)]
    pub conflict_resolution_strategy: Option<ConflictStrategy>,
}

/// Per-entity write counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntityWriteCounts {
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

/// Write counts grouped the way clients display them.
///
/// `plans` are curricula; `sessions` covers the learner's study record
/// (progress and preferences).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrationResults {
    pub plans: EntityWriteCounts,
    pub flashcards: EntityWriteCounts,
    pub sessions: EntityWriteCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictResolutionSummary {
    pub strategy: ConflictStrategy,
    pub conflicts: u32,
    pub resolutions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub pre_validation: Option<ValidationReport>,
    pub post_validation: Option<ValidationReport>,
    pub integrity_check: Option<IntegrityCheck>,
}

/// HTTP 200.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrateSuccessResponse {
    pub success: bool,
    pub session_id: String,
    pub migration_results: MigrationResults,
    pub conflict_resolution: ConflictResolutionSummary,
    pub validation: ValidationSummary,
    pub completed_at: DateTime<Utc>,
}

/// HTTP 400.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailureResponse {
    pub success: bool,
    pub error: String,
    pub validation_report: Option<ValidationReport>,
    pub session_id: String,
}

/// HTTP 500.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFailureResponse {
    pub success: bool,
    pub error: String,
    pub error_kind: ErrorKind,
    pub session_id: String,
    pub rollback_performed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_errors: Vec<String>,
}

/// Any response to `POST /migrate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum MigrateResponse {
    Success(MigrateSuccessResponse),
    // Tried before `ValidationFailed`: its required `errorKind` disambiguates.
    Failed(MigrationFailureResponse),
    ValidationFailed(ValidationFailureResponse),
}

impl MigrateResponse {
    /// HTTP status code for this response.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::ValidationFailed(_) => 400,
            Self::Failed(_) => 500,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Success(r) => &r.session_id,
            Self::ValidationFailed(r) => &r.session_id,
            Self::Failed(r) => &r.session_id,
        }
    }
}

/// Response of `GET /guests/{guestId}/eligibility`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub guest_id: String,
    pub should_migrate: bool,
    pub reason: String,
    pub stats: GuestUsageStats,
}

impl EligibilityResponse {
    /// Decide from usage stats whether a guest still has data worth migrating.
    #[must_use]
    pub fn from_stats(stats: GuestUsageStats) -> Self {
        let (should_migrate, reason) = if stats.consumed {
            (false, "guest data already migrated")
        } else if stats.has_content() {
            (true, "guest has unmigrated learning content")
        } else {
            (false, "guest has no learning content")
        };
        Self {
            guest_id: stats.guest_id.clone(),
            should_migrate,
            reason: reason.to_string(),
            stats,
        }
    }
}

/// Generic error body for malformed HTTP requests.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
