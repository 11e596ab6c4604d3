use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{
    AccountCurriculum, AccountFlashcard, AccountPreferences, AccountProgress, Curriculum,
    Flashcard, Preferences, Progress,
};

/// Everything a guest identity created before signing up.
///
/// Read-only input to the migration engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GuestDataset {
    #[serde(default)]
    pub curricula: Vec<Curriculum>,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub preferences: Preferences,
}

impl GuestDataset {
    /// No curricula, no flashcards, untouched progress and preferences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curricula.is_empty()
            && self.flashcards.is_empty()
            && self.progress.is_empty()
            && self.preferences.is_default()
    }
}

/// Snapshot of everything an account currently owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountDataset {
    pub account_id: String,
    #[serde(default)]
    pub curricula: Vec<AccountCurriculum>,
    #[serde(default)]
    pub flashcards: Vec<AccountFlashcard>,
    pub progress: Option<AccountProgress>,
    pub preferences: Option<AccountPreferences>,
}

impl AccountDataset {
    #[must_use]
    pub fn empty(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn curriculum(&self, id: &str) -> Option<&AccountCurriculum> {
        self.curricula.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn flashcard(&self, id: &str) -> Option<&AccountFlashcard> {
        self.flashcards.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.curricula.iter().map(AccountCurriculum::lesson_count).sum()
    }
}

/// Aggregate usage numbers for a guest profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GuestUsageStats {
    pub guest_id: String,
    pub curricula: u32,
    pub modules: u32,
    pub lessons: u32,
    pub lessons_completed: u32,
    pub flashcards: u32,
    pub flashcards_reviewed: u32,
    pub study_minutes: u32,
    pub has_custom_preferences: bool,
    pub last_active_at: Option<DateTime<Utc>>,
    /// The profile was already committed to an account.
    pub consumed: bool,
}

impl GuestUsageStats {
    /// Compute usage numbers from a dataset.
    #[must_use]
    pub fn from_dataset(guest_id: &str, dataset: &GuestDataset, consumed: bool) -> Self {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        Self {
            guest_id: guest_id.to_string(),
            curricula: count(dataset.curricula.len()),
            modules: count(dataset.curricula.iter().map(|c| c.modules.len()).sum()),
            lessons: count(dataset.curricula.iter().map(Curriculum::lesson_count).sum()),
            lessons_completed: count(
                dataset
                    .curricula
                    .iter()
                    .map(Curriculum::completed_lesson_count)
                    .sum(),
            ),
            flashcards: count(dataset.flashcards.len()),
            flashcards_reviewed: count(
                dataset
                    .flashcards
                    .iter()
                    .filter(|f| f.review_count > 0)
                    .count(),
            ),
            study_minutes: dataset.progress.total_study_minutes,
            has_custom_preferences: !dataset.preferences.is_default(),
            last_active_at: dataset.progress.last_active_at,
            consumed,
        }
    }

    /// Whether there is any content worth carrying into an account.
    #[must_use]
    pub const fn has_content(&self) -> bool {
        self.curricula > 0
            || self.flashcards > 0
            || self.study_minutes > 0
            || self.lessons_completed > 0
            || self.has_custom_preferences
    }
}

/// Receipt returned by the store's bulk commit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CommitReceipt {
    pub commit_id: String,
    pub guest_id: String,
    pub account_id: String,
    pub committed_at: DateTime<Utc>,
    pub curricula: u32,
    pub flashcards: u32,
}
