//! Entity structs for all Lumen domain objects.
//!
//! Guest-side types (`Curriculum`, `Flashcard`, ...) describe what a guest
//! created locally. Account-side types (`AccountCurriculum`, ...) carry
//! ownership and migration provenance. All structs derive `Serialize`,
//! `Deserialize`, and `JsonSchema`.

mod account;
mod checkpoint;
mod conflict;
mod curriculum;
mod dataset;
mod flashcard;
mod log;
mod progress;
mod session;
mod validation;

pub use account::{
    AccountCurriculum, AccountFlashcard, AccountLesson, AccountModule, AccountPreferences,
    AccountProgress, MigrationOrigin,
};
pub use checkpoint::Checkpoint;
pub use conflict::{
    ConflictBreakdown, ConflictRecord, ConflictStatistics, EntityConflictCounts, Resolution,
};
pub use curriculum::{Curriculum, Lesson, Module};
pub use dataset::{AccountDataset, CommitReceipt, GuestDataset, GuestUsageStats};
pub use flashcard::Flashcard;
pub use log::LogEntry;
pub use progress::{Preferences, Progress};
pub use session::{MigrationSession, SessionMetrics, SessionReport, SessionSummary};
pub use validation::{IntegrityCheck, IntegrityIssue, IntegrityProblem, ValidationReport};
