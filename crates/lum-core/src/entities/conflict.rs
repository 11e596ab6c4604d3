use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ConflictStrategy, EntityType};

/// How a single conflict was settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Existing identity kept, mergeable fields combined.
    Merged,
    /// Guest content written over the existing record.
    GuestKept,
    /// Existing record untouched, guest record dropped.
    ExistingKept,
    /// Both kept; the guest copy was renamed.
    Duplicated,
    /// Both sides were identical; nothing to do.
    Identical,
}

/// A detected collision between a guest record and an existing record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictRecord {
    pub entity_type: EntityType,
    /// Normalized natural key the two records collided on.
    pub natural_key: String,
    pub guest_id: String,
    pub existing_id: String,
    pub resolution: Resolution,
}

/// Conflict counts for one entity type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntityConflictCounts {
    pub detected: u32,
    pub resolved: u32,
}

/// Per-entity-type breakdown of conflicts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictBreakdown {
    pub curricula: EntityConflictCounts,
    pub flashcards: EntityConflictCounts,
    pub progress: EntityConflictCounts,
    pub preferences: EntityConflictCounts,
}

impl ConflictBreakdown {
    /// Counts slot for an entity type. Modules and lessons are counted with their curriculum.
    pub const fn slot_mut(&mut self, entity: EntityType) -> &mut EntityConflictCounts {
        match entity {
            EntityType::Curriculum | EntityType::Module | EntityType::Lesson => {
                &mut self.curricula
            }
            EntityType::Flashcard => &mut self.flashcards,
            EntityType::Progress => &mut self.progress,
            EntityType::Preferences => &mut self.preferences,
        }
    }
}

/// Totals reported after conflict resolution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictStatistics {
    pub strategy: ConflictStrategy,
    pub total_conflicts: u32,
    pub resolved_conflicts: u32,
    pub by_entity: ConflictBreakdown,
}

impl ConflictStatistics {
    #[must_use]
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Record one detected conflict and whether it was resolved.
    pub const fn record(&mut self, entity: EntityType, resolved: bool) {
        self.total_conflicts += 1;
        let slot = self.by_entity.slot_mut(entity);
        slot.detected += 1;
        if resolved {
            self.resolved_conflicts += 1;
            slot.resolved += 1;
        }
    }
}
