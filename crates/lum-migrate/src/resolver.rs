//! Conflict resolution between transformed guest data and the account's
//! existing data.
//!
//! Guest records are matched against existing records by natural key
//! (curriculum title, flashcard front and back). Progress and preferences are
//! per-account singletons that conflict when both sides carry data. The
//! result is a pure function of its inputs: the same guest data, existing
//! data, and strategy always yield the same final dataset, plan, and
//! statistics.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use lum_core::entities::{
    AccountCurriculum, AccountDataset, AccountFlashcard, AccountLesson, AccountModule,
    AccountPreferences, AccountProgress, ConflictRecord, ConflictStatistics, Resolution,
};
use lum_core::enums::{ConflictStrategy, EntityType};
use lum_core::keys::{curriculum_key, flashcard_key, lesson_key, module_key};
use serde::Serialize;

use crate::error::MigrationError;
use crate::transformer::TransformedDataset;

/// Suffix appended to titles and fronts of duplicated guest records.
pub const GUEST_COPY_SUFFIX: &str = " (guest copy)";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Insert,
    /// Replace the record stored under the same id.
    Update,
}

/// One store write the migration phase has to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedWrite {
    Curriculum {
        action: WriteAction,
        record: AccountCurriculum,
    },
    Flashcard {
        action: WriteAction,
        record: AccountFlashcard,
    },
    Progress {
        action: WriteAction,
        record: AccountProgress,
    },
    Preferences {
        action: WriteAction,
        record: AccountPreferences,
    },
}

impl PlannedWrite {
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Curriculum { .. } => EntityType::Curriculum,
            Self::Flashcard { .. } => EntityType::Flashcard,
            Self::Progress { .. } => EntityType::Progress,
            Self::Preferences { .. } => EntityType::Preferences,
        }
    }

    #[must_use]
    pub const fn action(&self) -> WriteAction {
        match self {
            Self::Curriculum { action, .. }
            | Self::Flashcard { action, .. }
            | Self::Progress { action, .. }
            | Self::Preferences { action, .. } => *action,
        }
    }

    /// Record id; singletons are addressed by their account id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Curriculum { record, .. } => &record.id,
            Self::Flashcard { record, .. } => &record.id,
            Self::Progress { record, .. } => &record.account_id,
            Self::Preferences { record, .. } => &record.account_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolutionResult {
    pub strategy: ConflictStrategy,
    /// What the account should hold once the plan has been applied.
    pub final_dataset: AccountDataset,
    pub plan: Vec<PlannedWrite>,
    pub statistics: ConflictStatistics,
    pub conflicts: Vec<ConflictRecord>,
}

/// Hands out ids that do not collide with any id already taken.
#[derive(Debug, Default)]
struct IdPool(BTreeSet<String>);

impl IdPool {
    fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self(ids.into_iter().map(str::to_string).collect())
    }

    /// `id`, or `id-guest`, `id-guest-2`, ... for the first free one.
    fn claim(&mut self, id: &str) -> String {
        if self.0.insert(id.to_string()) {
            return id.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = if n == 1 {
                format!("{id}-guest")
            } else {
                format!("{id}-guest-{n}")
            };
            if self.0.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Plan entries keyed by (entity, id) so repeated updates of one record fold
/// into a single write.
#[derive(Default)]
struct Plan {
    writes: Vec<PlannedWrite>,
    index: HashMap<(EntityType, String), usize>,
}

impl Plan {
    fn push(&mut self, write: PlannedWrite) {
        let key = (write.entity_type(), write.id().to_string());
        if let Some(&at) = self.index.get(&key) {
            let action = self.writes[at].action();
            self.writes[at] = with_action(write, action);
        } else {
            self.index.insert(key, self.writes.len());
            self.writes.push(write);
        }
    }
}

fn with_action(write: PlannedWrite, action: WriteAction) -> PlannedWrite {
    match write {
        PlannedWrite::Curriculum { record, .. } => PlannedWrite::Curriculum { action, record },
        PlannedWrite::Flashcard { record, .. } => PlannedWrite::Flashcard { action, record },
        PlannedWrite::Progress { record, .. } => PlannedWrite::Progress { action, record },
        PlannedWrite::Preferences { record, .. } => PlannedWrite::Preferences { action, record },
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn merge_lesson(existing: &mut AccountLesson, guest: &AccountLesson) {
    if !guest.completed {
        return;
    }
    if existing.completed {
        existing.completed_at = earliest(existing.completed_at, guest.completed_at);
    } else {
        existing.completed = true;
        existing.completed_at = guest.completed_at;
    }
}

fn merge_module(existing: &mut AccountModule, guest: &AccountModule) {
    let mut ids = IdPool::new(existing.lessons.iter().map(|l| l.id.as_str()));
    for lesson in &guest.lessons {
        let key = lesson_key(&lesson.title);
        if let Some(target) = existing
            .lessons
            .iter_mut()
            .find(|l| lesson_key(&l.title) == key)
        {
            merge_lesson(target, lesson);
        } else {
            let mut added = lesson.clone();
            added.id = ids.claim(&lesson.id);
            added.account_id.clone_from(&existing.account_id);
            existing.lessons.push(added);
        }
    }
}

/// Existing identity wins; modules and lessons are unioned by title.
fn merge_curriculum(existing: &AccountCurriculum, guest: &AccountCurriculum) -> AccountCurriculum {
    let mut merged = existing.clone();
    if merged.domain.trim().is_empty() {
        merged.domain.clone_from(&guest.domain);
    }
    let mut ids = IdPool::new(merged.modules.iter().map(|m| m.id.as_str()));
    for module in &guest.modules {
        let key = module_key(&module.title);
        if let Some(target) = merged
            .modules
            .iter_mut()
            .find(|m| module_key(&m.title) == key)
        {
            merge_module(target, module);
        } else {
            let mut added = module.clone();
            added.id = ids.claim(&module.id);
            added.account_id.clone_from(&merged.account_id);
            for lesson in &mut added.lessons {
                lesson.account_id.clone_from(&merged.account_id);
            }
            merged.modules.push(added);
        }
    }
    merged
}

/// Existing id and difficulty win; tags union, counters sum, latest review.
fn merge_flashcard(existing: &AccountFlashcard, guest: &AccountFlashcard) -> AccountFlashcard {
    let mut merged = existing.clone();
    merged.tags.extend(guest.tags.iter().cloned());
    merged.review_count = merged.review_count.saturating_add(guest.review_count);
    merged.correct_count = merged.correct_count.saturating_add(guest.correct_count);
    merged.last_reviewed_at = latest(merged.last_reviewed_at, guest.last_reviewed_at);
    merged
}

struct Resolver<'a> {
    strategy: ConflictStrategy,
    account_id: &'a str,
    final_dataset: AccountDataset,
    plan: Plan,
    statistics: ConflictStatistics,
    conflicts: Vec<ConflictRecord>,
}

impl Resolver<'_> {
    fn conflict(
        &mut self,
        entity_type: EntityType,
        natural_key: String,
        guest_id: &str,
        existing_id: &str,
        resolution: Resolution,
    ) {
        self.statistics.record(entity_type, true);
        self.conflicts.push(ConflictRecord {
            entity_type,
            natural_key,
            guest_id: guest_id.to_string(),
            existing_id: existing_id.to_string(),
            resolution,
        });
    }

    fn curricula(&mut self, guest: &[AccountCurriculum]) {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (pos, c) in self.final_dataset.curricula.iter().enumerate() {
            index.entry(curriculum_key(&c.title)).or_insert(pos);
        }
        let mut ids = IdPool::new(self.final_dataset.curricula.iter().map(|c| c.id.as_str()));

        for incoming in guest {
            let key = curriculum_key(&incoming.title);
            let Some(&pos) = index.get(&key) else {
                let mut added = incoming.clone();
                added.id = ids.claim(&incoming.id);
                self.final_dataset.curricula.push(added.clone());
                self.plan.push(PlannedWrite::Curriculum {
                    action: WriteAction::Insert,
                    record: added,
                });
                continue;
            };

            let current = self.final_dataset.curricula[pos].clone();
            let replacement = match self.strategy {
                ConflictStrategy::MergeWithPreference => Some(merge_curriculum(&current, incoming)),
                ConflictStrategy::GuestPriority => Some(AccountCurriculum {
                    id: current.id.clone(),
                    created_at: current.created_at,
                    ..incoming.clone()
                }),
                ConflictStrategy::ExistingPriority => None,
                ConflictStrategy::CreateDuplicate => {
                    let mut copy = incoming.clone();
                    copy.id = ids.claim(&incoming.id);
                    copy.title = format!("{}{GUEST_COPY_SUFFIX}", incoming.title);
                    self.final_dataset.curricula.push(copy.clone());
                    self.plan.push(PlannedWrite::Curriculum {
                        action: WriteAction::Insert,
                        record: copy,
                    });
                    self.conflict(
                        EntityType::Curriculum,
                        key,
                        &incoming.id,
                        &current.id,
                        Resolution::Duplicated,
                    );
                    continue;
                }
            };

            let resolution = match replacement {
                None => Resolution::ExistingKept,
                Some(next) if next.same_content(&current) => Resolution::Identical,
                Some(next) => {
                    self.final_dataset.curricula[pos] = next.clone();
                    self.plan.push(PlannedWrite::Curriculum {
                        action: WriteAction::Update,
                        record: next,
                    });
                    if self.strategy == ConflictStrategy::GuestPriority {
                        Resolution::GuestKept
                    } else {
                        Resolution::Merged
                    }
                }
            };
            self.conflict(EntityType::Curriculum, key, &incoming.id, &current.id, resolution);
        }
    }

    fn flashcards(&mut self, guest: &[AccountFlashcard]) {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (pos, f) in self.final_dataset.flashcards.iter().enumerate() {
            index.entry(flashcard_key(&f.front, &f.back)).or_insert(pos);
        }
        let mut ids = IdPool::new(self.final_dataset.flashcards.iter().map(|f| f.id.as_str()));

        for incoming in guest {
            let key = flashcard_key(&incoming.front, &incoming.back);
            let Some(&pos) = index.get(&key) else {
                let mut added = incoming.clone();
                added.id = ids.claim(&incoming.id);
                self.final_dataset.flashcards.push(added.clone());
                self.plan.push(PlannedWrite::Flashcard {
                    action: WriteAction::Insert,
                    record: added,
                });
                continue;
            };

            let current = self.final_dataset.flashcards[pos].clone();
            let replacement = match self.strategy {
                ConflictStrategy::MergeWithPreference => Some(merge_flashcard(&current, incoming)),
                ConflictStrategy::GuestPriority => Some(AccountFlashcard {
                    id: current.id.clone(),
                    ..incoming.clone()
                }),
                ConflictStrategy::ExistingPriority => None,
                ConflictStrategy::CreateDuplicate => {
                    let mut copy = incoming.clone();
                    copy.id = ids.claim(&incoming.id);
                    copy.front = format!("{}{GUEST_COPY_SUFFIX}", incoming.front);
                    self.final_dataset.flashcards.push(copy.clone());
                    self.plan.push(PlannedWrite::Flashcard {
                        action: WriteAction::Insert,
                        record: copy,
                    });
                    self.conflict(
                        EntityType::Flashcard,
                        key,
                        &incoming.id,
                        &current.id,
                        Resolution::Duplicated,
                    );
                    continue;
                }
            };

            let resolution = match replacement {
                None => Resolution::ExistingKept,
                Some(next) if next.same_content(&current) => Resolution::Identical,
                Some(next) => {
                    self.final_dataset.flashcards[pos] = next.clone();
                    self.plan.push(PlannedWrite::Flashcard {
                        action: WriteAction::Update,
                        record: next,
                    });
                    if self.strategy == ConflictStrategy::GuestPriority {
                        Resolution::GuestKept
                    } else {
                        Resolution::Merged
                    }
                }
            };
            self.conflict(EntityType::Flashcard, key, &incoming.id, &current.id, resolution);
        }
    }

    fn progress(&mut self, guest: Option<&AccountProgress>) -> Result<(), MigrationError> {
        let Some(incoming) = guest else {
            return Ok(());
        };
        let current = self.final_dataset.progress.clone();
        let Some(current) = current.filter(|p| !p.progress.is_empty()) else {
            let action = if self.final_dataset.progress.is_some() {
                WriteAction::Update
            } else {
                WriteAction::Insert
            };
            self.final_dataset.progress = Some(incoming.clone());
            self.plan.push(PlannedWrite::Progress {
                action,
                record: incoming.clone(),
            });
            return Ok(());
        };

        let next = match self.strategy {
            ConflictStrategy::MergeWithPreference => Some(AccountProgress {
                progress: current.progress.combined_with(&incoming.progress),
                ..current.clone()
            }),
            ConflictStrategy::GuestPriority => Some(incoming.clone()),
            ConflictStrategy::ExistingPriority => None,
            ConflictStrategy::CreateDuplicate => {
                if current.progress != incoming.progress {
                    return Err(MigrationError::ConflictResolution(
                        "progress is a per-account record and cannot be duplicated".into(),
                    ));
                }
                None
            }
        };
        let resolution = match next {
            None if current.progress == incoming.progress => Resolution::Identical,
            None => Resolution::ExistingKept,
            Some(next) if next.progress == current.progress => Resolution::Identical,
            Some(next) => {
                self.final_dataset.progress = Some(next.clone());
                self.plan.push(PlannedWrite::Progress {
                    action: WriteAction::Update,
                    record: next,
                });
                if self.strategy == ConflictStrategy::GuestPriority {
                    Resolution::GuestKept
                } else {
                    Resolution::Merged
                }
            }
        };
        self.conflict(
            EntityType::Progress,
            "progress".into(),
            self.account_id,
            self.account_id,
            resolution,
        );
        Ok(())
    }

    fn preferences(&mut self, guest: Option<&AccountPreferences>) -> Result<(), MigrationError> {
        let Some(incoming) = guest else {
            return Ok(());
        };
        let Some(current) = self.final_dataset.preferences.clone() else {
            self.final_dataset.preferences = Some(incoming.clone());
            self.plan.push(PlannedWrite::Preferences {
                action: WriteAction::Insert,
                record: incoming.clone(),
            });
            return Ok(());
        };

        let identical = current.preferences == incoming.preferences;
        let resolution = match self.strategy {
            _ if identical => Resolution::Identical,
            // Preferences are a matter of taste: merging keeps the account's.
            ConflictStrategy::MergeWithPreference | ConflictStrategy::ExistingPriority => {
                Resolution::ExistingKept
            }
            ConflictStrategy::GuestPriority => {
                self.final_dataset.preferences = Some(incoming.clone());
                self.plan.push(PlannedWrite::Preferences {
                    action: WriteAction::Update,
                    record: incoming.clone(),
                });
                Resolution::GuestKept
            }
            ConflictStrategy::CreateDuplicate => {
                return Err(MigrationError::ConflictResolution(
                    "preferences are a per-account record and cannot be duplicated".into(),
                ));
            }
        };
        self.conflict(
            EntityType::Preferences,
            "preferences".into(),
            self.account_id,
            self.account_id,
            resolution,
        );
        Ok(())
    }
}

/// Resolve guest data against the account's existing data.
///
/// # Errors
///
/// Returns `MigrationError::ConflictResolution` when the datasets target
/// different accounts, or when `create_duplicate` meets a singleton whose
/// two records differ.
pub fn resolve(
    transformed: &TransformedDataset,
    existing: &AccountDataset,
    strategy: ConflictStrategy,
) -> Result<ConflictResolutionResult, MigrationError> {
    if transformed.account_id != existing.account_id {
        return Err(MigrationError::ConflictResolution(format!(
            "guest data targets account '{}' but existing data belongs to '{}'",
            transformed.account_id, existing.account_id
        )));
    }

    let mut resolver = Resolver {
        strategy,
        account_id: &transformed.account_id,
        final_dataset: existing.clone(),
        plan: Plan::default(),
        statistics: ConflictStatistics::new(strategy),
        conflicts: Vec::new(),
    };
    resolver.curricula(&transformed.curricula);
    resolver.flashcards(&transformed.flashcards);
    resolver.progress(transformed.progress.as_ref())?;
    resolver.preferences(transformed.preferences.as_ref())?;

    tracing::debug!(
        strategy = %strategy,
        conflicts = resolver.statistics.total_conflicts,
        writes = resolver.plan.writes.len(),
        "conflicts resolved"
    );

    Ok(ConflictResolutionResult {
        strategy,
        final_dataset: resolver.final_dataset,
        plan: resolver.plan.writes,
        statistics: resolver.statistics,
        conflicts: resolver.conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pool_suffixes_deterministically() {
        let mut pool = IdPool::new(["c1", "c1-guest"]);
        assert_eq!(pool.claim("c2"), "c2");
        assert_eq!(pool.claim("c1"), "c1-guest-2");
        assert_eq!(pool.claim("c1"), "c1-guest-3");
    }

    #[test]
    fn lesson_merge_keeps_earliest_completion() {
        let at = |d| DateTime::<Utc>::from_timestamp(d, 0);
        let mut existing = AccountLesson {
            id: "l1".into(),
            account_id: "a".into(),
            title: "Intro".into(),
            duration_minutes: 5,
            completed: true,
            completed_at: at(2_000),
        };
        let guest = AccountLesson {
            completed_at: at(1_000),
            ..existing.clone()
        };
        merge_lesson(&mut existing, &guest);
        assert_eq!(existing.completed_at, at(1_000));

        let mut open = AccountLesson {
            completed: false,
            completed_at: None,
            ..existing.clone()
        };
        merge_lesson(&mut open, &guest);
        assert!(open.completed);
        assert_eq!(open.completed_at, at(1_000));
    }

    #[test]
    fn plan_folds_repeated_updates() {
        let mut plan = Plan::default();
        let card = |front: &str| AccountFlashcard {
            id: "f1".into(),
            account_id: "a".into(),
            front: front.into(),
            back: "b".into(),
            tags: BTreeSet::new(),
            difficulty: lum_core::enums::Difficulty::Easy,
            review_count: 0,
            correct_count: 0,
            last_reviewed_at: None,
            origin: None,
        };
        plan.push(PlannedWrite::Flashcard {
            action: WriteAction::Update,
            record: card("one"),
        });
        plan.push(PlannedWrite::Flashcard {
            action: WriteAction::Update,
            record: card("two"),
        });
        assert_eq!(plan.writes.len(), 1);
        assert!(matches!(&plan.writes[0], PlannedWrite::Flashcard { record, .. } if record.front == "two"));
    }
}
