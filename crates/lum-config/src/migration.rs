//! Migration engine tuning: default strategy, business bounds, deadline.

use std::time::Duration;

use lum_core::enums::ConflictStrategy;
use serde::{Deserialize, Serialize};

const fn default_max_curricula() -> u32 {
    100
}

const fn default_max_flashcards() -> u32 {
    5_000
}

const fn default_max_modules() -> u32 {
    50
}

const fn default_max_lessons() -> u32 {
    200
}

const fn default_min_integrity_score() -> u8 {
    80
}

const fn default_deadline_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Strategy used when a request does not name one.
    #[serde(default)]
    pub default_strategy: ConflictStrategy,

    /// Upper bound on curricula in a single guest dataset.
    #[serde(default = "default_max_curricula")]
    pub max_curricula: u32,

    /// Upper bound on flashcards in a single guest dataset.
    #[serde(default = "default_max_flashcards")]
    pub max_flashcards: u32,

    #[serde(default = "default_max_modules")]
    pub max_modules_per_curriculum: u32,

    #[serde(default = "default_max_lessons")]
    pub max_lessons_per_module: u32,

    /// Pre-migration reports scoring below this are rejected (0-100).
    #[serde(default = "default_min_integrity_score")]
    pub min_integrity_score: u8,

    /// Deadline applied by `lum serve` and `lum migrate`. `0` disables it.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            default_strategy: ConflictStrategy::default(),
            max_curricula: default_max_curricula(),
            max_flashcards: default_max_flashcards(),
            max_modules_per_curriculum: default_max_modules(),
            max_lessons_per_module: default_max_lessons(),
            min_integrity_score: default_min_integrity_score(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl MigrationConfig {
    /// The configured deadline, or `None` when disabled.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        if self.deadline_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.deadline_secs))
        }
    }
}
