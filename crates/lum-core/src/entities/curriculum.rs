use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A guest-owned curriculum: an ordered tree of modules and lessons.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Curriculum {
    pub id: String,
    pub title: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// A module inside a curriculum. Ids are unique within the parent curriculum.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

/// A lesson inside a module. Ids are unique within the parent module.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Curriculum {
    /// Total lessons across all modules.
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Lessons marked completed across all modules.
    #[must_use]
    pub fn completed_lesson_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.lessons)
            .filter(|l| l.completed)
            .count()
    }
}
