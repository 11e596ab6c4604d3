//! Guest schema to account schema.
//!
//! Pure: ownership and provenance are attached, ids, order, and nesting are
//! kept exactly. The timestamp is passed in so the output is reproducible.

use chrono::{DateTime, Utc};
use lum_core::entities::{
    AccountCurriculum, AccountFlashcard, AccountLesson, AccountModule, AccountPreferences,
    AccountProgress, Curriculum, Flashcard, GuestDataset, MigrationOrigin,
};
use serde::Serialize;

use crate::error::MigrationError;

/// Item counts of a transformation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransformationSummary {
    pub curricula: u32,
    pub modules: u32,
    pub lessons: u32,
    pub flashcards: u32,
    pub progress: bool,
    pub preferences: bool,
    pub transformed_at: DateTime<Utc>,
}

/// Guest content re-expressed as account records.
///
/// Empty progress and default preferences carry nothing worth migrating and
/// are dropped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedDataset {
    pub source_guest_id: String,
    pub account_id: String,
    pub session_id: String,
    pub curricula: Vec<AccountCurriculum>,
    pub flashcards: Vec<AccountFlashcard>,
    pub progress: Option<AccountProgress>,
    pub preferences: Option<AccountPreferences>,
    pub summary: TransformationSummary,
}

fn count(n: usize, what: &str) -> Result<u32, MigrationError> {
    u32::try_from(n).map_err(|_| MigrationError::Transformation(format!("too many {what}: {n}")))
}

fn transform_curriculum(c: &Curriculum, account_id: &str, origin: &MigrationOrigin) -> AccountCurriculum {
    AccountCurriculum {
        id: c.id.clone(),
        account_id: account_id.to_string(),
        title: c.title.clone(),
        domain: c.domain.clone(),
        created_at: c.created_at,
        modules: c
            .modules
            .iter()
            .map(|m| AccountModule {
                id: m.id.clone(),
                account_id: account_id.to_string(),
                title: m.title.clone(),
                lessons: m
                    .lessons
                    .iter()
                    .map(|l| AccountLesson {
                        id: l.id.clone(),
                        account_id: account_id.to_string(),
                        title: l.title.clone(),
                        duration_minutes: l.duration_minutes,
                        completed: l.completed,
                        completed_at: l.completed_at,
                    })
                    .collect(),
            })
            .collect(),
        origin: Some(origin.clone()),
    }
}

fn transform_flashcard(f: &Flashcard, account_id: &str, origin: &MigrationOrigin) -> AccountFlashcard {
    AccountFlashcard {
        id: f.id.clone(),
        account_id: account_id.to_string(),
        front: f.front.clone(),
        back: f.back.clone(),
        tags: f.tags.clone(),
        difficulty: f.difficulty,
        review_count: f.review_count,
        correct_count: f.correct_count,
        last_reviewed_at: f.last_reviewed_at,
        origin: Some(origin.clone()),
    }
}

/// Re-own every guest record under `account_id`.
///
/// # Errors
///
/// Returns `MigrationError::Transformation` if an owner id is blank or a
/// count does not fit the summary.
pub fn transform(
    guest: &GuestDataset,
    guest_id: &str,
    account_id: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<TransformedDataset, MigrationError> {
    if account_id.trim().is_empty() {
        return Err(MigrationError::Transformation("account id is empty".into()));
    }
    if guest_id.trim().is_empty() {
        return Err(MigrationError::Transformation("guest id is empty".into()));
    }

    let origin = MigrationOrigin {
        source_guest_id: guest_id.to_string(),
        session_id: session_id.to_string(),
        migrated_at: now,
    };

    let curricula: Vec<_> = guest
        .curricula
        .iter()
        .map(|c| transform_curriculum(c, account_id, &origin))
        .collect();
    let flashcards: Vec<_> = guest
        .flashcards
        .iter()
        .map(|f| transform_flashcard(f, account_id, &origin))
        .collect();
    let progress = (!guest.progress.is_empty()).then(|| AccountProgress {
        account_id: account_id.to_string(),
        progress: guest.progress.clone(),
        origin: Some(origin.clone()),
    });
    let preferences = (!guest.preferences.is_default()).then(|| AccountPreferences {
        account_id: account_id.to_string(),
        preferences: guest.preferences.clone(),
        origin: Some(origin.clone()),
    });

    let summary = TransformationSummary {
        curricula: count(curricula.len(), "curricula")?,
        modules: count(curricula.iter().map(|c| c.modules.len()).sum(), "modules")?,
        lessons: count(curricula.iter().map(AccountCurriculum::lesson_count).sum(), "lessons")?,
        flashcards: count(flashcards.len(), "flashcards")?,
        progress: progress.is_some(),
        preferences: preferences.is_some(),
        transformed_at: now,
    };

    tracing::debug!(
        guest = guest_id,
        account = account_id,
        curricula = summary.curricula,
        flashcards = summary.flashcards,
        "guest data transformed"
    );

    Ok(TransformedDataset {
        source_guest_id: guest_id.to_string(),
        account_id: account_id.to_string(),
        session_id: session_id.to_string(),
        curricula,
        flashcards,
        progress,
        preferences,
        summary,
    })
}
