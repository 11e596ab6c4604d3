//! Wire-contract tests for the migration entrypoint envelopes.
//!
//! Checks the camelCase request shape clients send and validates response
//! envelopes against their schemars-generated JSON Schemas.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use schemars::schema_for;
use serde_json::json;

use lum_core::entities::{GuestUsageStats, ValidationReport};
use lum_core::enums::{ConflictStrategy, ErrorKind, ValidationStage};
use lum_core::responses::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

fn sample_report() -> ValidationReport {
    ValidationReport {
        stage: ValidationStage::PreMigration,
        valid: false,
        errors: vec!["curriculum[0]: title is empty".into()],
        warnings: vec![],
        integrity_score: 72,
        checks_run: 18,
        checks_passed: 13,
    }
}

#[test]
fn request_accepts_client_payload() {
    let body = json!({
        "guestId": "guest-42",
        "accountId": "acct-7",
        "guestData": {
            "curricula": [{
                "id": "c1",
                "title": "Spanish A1",
                "domain": "languages",
                "created_at": "2026-05-01T10:00:00Z",
                "modules": [{
                    "id": "m1",
                    "title": "Greetings",
                    "lessons": [{
                        "id": "l1",
                        "title": "Hola",
                        "duration_minutes": 10,
                        "completed": true,
                        "completed_at": "2026-05-02T10:00:00Z"
                    }]
                }]
            }],
            "flashcards": [{
                "id": "f1",
                "front": "hola",
                "back": "hello",
                "tags": ["greeting"],
                "difficulty": "easy",
                "review_count": 3,
                "correct_count": 2,
                "last_reviewed_at": null
            }]
        },
        "conflictResolutionStrategy": "guest_priority"
    });

    let request: MigrateRequest = serde_json::from_value(body).unwrap();
    assert_eq!(request.guest_id, "guest-42");
    assert_eq!(
        request.conflict_resolution_strategy,
        Some(ConflictStrategy::GuestPriority)
    );
    assert_eq!(request.guest_data.curricula[0].modules[0].lessons.len(), 1);
    assert!(request.guest_data.progress.is_empty());
    assert!(request.guest_data.preferences.is_default());
}

#[test]
fn request_strategy_is_optional() {
    let request: MigrateRequest = serde_json::from_value(json!({
        "guestId": "g",
        "accountId": "a",
        "guestData": {}
    }))
    .unwrap();
    assert_eq!(request.conflict_resolution_strategy, None);
    assert!(request.guest_data.is_empty());
}

#[test]
fn success_envelope_matches_schema_and_status() {
    let response = MigrateResponse::Success(MigrateSuccessResponse {
        success: true,
        session_id: "mig-0a1b2c3d".into(),
        migration_results: MigrationResults {
            plans: EntityWriteCounts {
                success: 2,
                failed: 0,
                errors: vec![],
            },
            flashcards: EntityWriteCounts {
                success: 5,
                failed: 0,
                errors: vec![],
            },
            sessions: EntityWriteCounts::default(),
        },
        conflict_resolution: ConflictResolutionSummary {
            strategy: ConflictStrategy::MergeWithPreference,
            conflicts: 1,
            resolutions: 1,
        },
        validation: ValidationSummary {
            pre_validation: None,
            post_validation: None,
            integrity_check: None,
        },
        completed_at: Utc.with_ymd_and_hms(2026, 5, 3, 12, 0, 0).unwrap(),
    });

    assert_eq!(response.status_code(), 200);
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["migrationResults"]["flashcards"]["success"], 5);
    assert_eq!(value["conflictResolution"]["strategy"], "merge_with_preference");

    let schema = serde_json::to_value(schema_for!(MigrateResponse)).unwrap();
    let errors = validate_against_schema(&schema, &value);
    assert!(errors.is_empty(), "schema errors: {errors:?}");
}

#[test]
fn failure_envelopes_keep_their_variant_through_json() {
    let validation = MigrateResponse::ValidationFailed(ValidationFailureResponse {
        success: false,
        error: "guest data failed validation".into(),
        validation_report: Some(sample_report()),
        session_id: "mig-00000001".into(),
    });
    let failed = MigrateResponse::Failed(MigrationFailureResponse {
        success: false,
        error: "bulk commit failed".into(),
        error_kind: ErrorKind::Persistence,
        session_id: "mig-00000002".into(),
        rollback_performed: true,
        rollback_errors: vec![],
    });

    assert_eq!(validation.status_code(), 400);
    assert_eq!(failed.status_code(), 500);

    for response in [validation, failed] {
        let json = serde_json::to_string(&response).unwrap();
        let recovered: MigrateResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, response);
    }
}

#[test]
fn eligibility_follows_usage_stats() {
    let empty = GuestUsageStats {
        guest_id: "g1".into(),
        ..GuestUsageStats::default()
    };
    assert!(!EligibilityResponse::from_stats(empty.clone()).should_migrate);

    let active = GuestUsageStats {
        flashcards: 4,
        ..empty.clone()
    };
    let response = EligibilityResponse::from_stats(active.clone());
    assert!(response.should_migrate);
    assert_eq!(response.guest_id, "g1");

    let consumed = GuestUsageStats {
        consumed: true,
        ..active
    };
    let response = EligibilityResponse::from_stats(consumed);
    assert!(!response.should_migrate);
    assert_eq!(response.reason, "guest data already migrated");
}
