use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{Preferences, Progress};
use crate::enums::Difficulty;

/// Provenance attached to every record produced by a migration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrationOrigin {
    pub source_guest_id: String,
    pub session_id: String,
    pub migrated_at: DateTime<Utc>,
}

/// Account-owned curriculum.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountCurriculum {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modules: Vec<AccountModule>,
    pub origin: Option<MigrationOrigin>,
}

/// Account-owned module; position is its index in `AccountCurriculum::modules`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountModule {
    pub id: String,
    pub account_id: String,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<AccountLesson>,
}

/// Account-owned lesson; position is its index in `AccountModule::lessons`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountLesson {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub duration_minutes: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Account-owned flashcard.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountFlashcard {
    pub id: String,
    pub account_id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub difficulty: Difficulty,
    pub review_count: u32,
    pub correct_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub origin: Option<MigrationOrigin>,
}

/// Account-owned progress record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountProgress {
    pub account_id: String,
    pub progress: Progress,
    pub origin: Option<MigrationOrigin>,
}

/// Account-owned preferences record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountPreferences {
    pub account_id: String,
    pub preferences: Preferences,
    pub origin: Option<MigrationOrigin>,
}

impl AccountCurriculum {
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Compare domain content, ignoring provenance metadata.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.account_id == other.account_id
            && self.title == other.title
            && self.domain == other.domain
            && self.modules == other.modules
    }
}

impl AccountFlashcard {
    /// Compare domain content, ignoring provenance metadata.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.account_id == other.account_id
            && self.front == other.front
            && self.back == other.back
            && self.tags == other.tags
            && self.difficulty == other.difficulty
            && self.review_count == other.review_count
            && self.correct_count == other.correct_count
            && self.last_reviewed_at == other.last_reviewed_at
    }
}
