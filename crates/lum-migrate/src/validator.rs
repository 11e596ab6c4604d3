//! Structural and business-rule validation at the three checkpoints of a
//! migration, plus the post-write integrity comparison.
//!
//! Scores are weighted pass rates: structural checks count three times as
//! much as business checks.

use std::collections::HashSet;

use lum_config::MigrationConfig;
use lum_core::entities::{
    AccountDataset, GuestDataset, IntegrityCheck, IntegrityIssue, IntegrityProblem,
    MigrationOrigin, ValidationReport,
};
use lum_core::enums::{EntityType, ValidationStage};
use lum_core::keys::{curriculum_key, flashcard_key};
use lum_core::store::AccountStore;

use crate::error::MigrationError;
use crate::resolver::ConflictResolutionResult;
use crate::transformer::TransformedDataset;

const STRUCTURAL_WEIGHT: u64 = 3;
const BUSINESS_WEIGHT: u64 = 1;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Business bounds applied to guest data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_curricula: u32,
    pub max_flashcards: u32,
    pub max_modules_per_curriculum: u32,
    pub max_lessons_per_module: u32,
    pub min_integrity_score: u8,
}

impl From<&MigrationConfig> for ValidationLimits {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            max_curricula: config.max_curricula,
            max_flashcards: config.max_flashcards,
            max_modules_per_curriculum: config.max_modules_per_curriculum,
            max_lessons_per_module: config.max_lessons_per_module,
            min_integrity_score: config.min_integrity_score,
        }
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self::from(&MigrationConfig::default())
    }
}

#[derive(Clone, Copy)]
enum Weight {
    Structural,
    Business,
}

#[derive(Default)]
struct Tally {
    structural: (u64, u64),
    business: (u64, u64),
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Tally {
    fn check(&mut self, weight: Weight, ok: bool, message: impl FnOnce() -> String) {
        let slot = match weight {
            Weight::Structural => &mut self.structural,
            Weight::Business => &mut self.business,
        };
        slot.0 += 1;
        if ok {
            slot.1 += 1;
        } else {
            self.errors.push(message());
        }
    }

    /// A business check whose failure only warns but still lowers the score.
    fn soft(&mut self, ok: bool, message: impl FnOnce() -> String) {
        self.business.0 += 1;
        if ok {
            self.business.1 += 1;
        } else {
            self.warnings.push(message());
        }
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn score(&self) -> u8 {
        let total = self.structural.0 * STRUCTURAL_WEIGHT + self.business.0 * BUSINESS_WEIGHT;
        if total == 0 {
            return 100;
        }
        let passed = self.structural.1 * STRUCTURAL_WEIGHT + self.business.1 * BUSINESS_WEIGHT;
        // Rounded integer percentage; passed <= total keeps it within 0..=100.
        u8::try_from((passed * 100 + total / 2) / total).unwrap_or(100)
    }

    fn finish(mut self, stage: ValidationStage, min_score: Option<u8>) -> ValidationReport {
        let score = self.score();
        if let Some(min) = min_score
            && score < min
            && self.errors.is_empty()
        {
            self.errors
                .push(format!("integrity score {score} is below the minimum of {min}"));
        }
        let run = self.structural.0 + self.business.0;
        let passed = self.structural.1 + self.business.1;
        ValidationReport {
            stage,
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            integrity_score: score,
            checks_run: u32::try_from(run).unwrap_or(u32::MAX),
            checks_passed: u32::try_from(passed).unwrap_or(u32::MAX),
        }
    }
}

fn within(len: usize, max: u32) -> bool {
    u32::try_from(len).is_ok_and(|n| n <= max)
}

/// Runs validation with a fixed set of limits.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    #[must_use]
    pub const fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Pre-migration checks on raw guest data.
    #[must_use]
    pub fn validate_guest_data(&self, data: &GuestDataset) -> ValidationReport {
        let limits = &self.limits;
        let mut t = Tally::default();

        if data.is_empty() {
            t.warn("guest dataset is empty; nothing will be migrated".into());
        }

        t.check(Weight::Business, within(data.curricula.len(), limits.max_curricula), || {
            format!(
                "{} curricula exceed the limit of {}",
                data.curricula.len(),
                limits.max_curricula
            )
        });
        t.check(Weight::Business, within(data.flashcards.len(), limits.max_flashcards), || {
            format!(
                "{} flashcards exceed the limit of {}",
                data.flashcards.len(),
                limits.max_flashcards
            )
        });

        let mut curriculum_ids = HashSet::new();
        let mut curriculum_titles = HashSet::new();
        for (ci, c) in data.curricula.iter().enumerate() {
            let at = format!("curricula[{ci}]");
            t.check(Weight::Structural, !c.id.trim().is_empty(), || format!("{at}: id is empty"));
            t.check(Weight::Structural, curriculum_ids.insert(c.id.as_str()), || {
                format!("{at}: duplicate curriculum id '{}'", c.id)
            });
            t.check(Weight::Structural, !c.title.trim().is_empty(), || {
                format!("{at}: title is empty")
            });
            t.soft(curriculum_titles.insert(curriculum_key(&c.title)), || {
                format!("{at}: title '{}' appears more than once", c.title)
            });
            t.check(
                Weight::Business,
                within(c.modules.len(), limits.max_modules_per_curriculum),
                || {
                    format!(
                        "{at}: {} modules exceed the limit of {}",
                        c.modules.len(),
                        limits.max_modules_per_curriculum
                    )
                },
            );

            let mut module_ids = HashSet::new();
            for (mi, m) in c.modules.iter().enumerate() {
                let at = format!("{at}.modules[{mi}]");
                t.check(Weight::Structural, !m.id.trim().is_empty(), || {
                    format!("{at}: id is empty")
                });
                t.check(Weight::Structural, module_ids.insert(m.id.as_str()), || {
                    format!("{at}: duplicate module id '{}'", m.id)
                });
                t.check(Weight::Structural, m.id != c.id, || {
                    format!("{at}: module id '{}' repeats its curriculum id", m.id)
                });
                t.check(Weight::Structural, !m.title.trim().is_empty(), || {
                    format!("{at}: title is empty")
                });
                t.check(
                    Weight::Business,
                    within(m.lessons.len(), limits.max_lessons_per_module),
                    || {
                        format!(
                            "{at}: {} lessons exceed the limit of {}",
                            m.lessons.len(),
                            limits.max_lessons_per_module
                        )
                    },
                );

                let mut lesson_ids = HashSet::new();
                for (li, l) in m.lessons.iter().enumerate() {
                    let at = format!("{at}.lessons[{li}]");
                    t.check(Weight::Structural, !l.id.trim().is_empty(), || {
                        format!("{at}: id is empty")
                    });
                    t.check(Weight::Structural, lesson_ids.insert(l.id.as_str()), || {
                        format!("{at}: duplicate lesson id '{}'", l.id)
                    });
                    t.check(Weight::Structural, l.id != m.id && l.id != c.id, || {
                        format!("{at}: lesson id '{}' repeats an ancestor id", l.id)
                    });
                    t.check(Weight::Structural, !l.title.trim().is_empty(), || {
                        format!("{at}: title is empty")
                    });
                    t.check(Weight::Structural, l.completed || l.completed_at.is_none(), || {
                        format!("{at}: completion time set on an incomplete lesson")
                    });
                    if l.completed && l.completed_at.is_none() {
                        t.warn(format!("{at}: completed lesson has no completion time"));
                    }
                    t.soft(l.duration_minutes > 0, || format!("{at}: lesson has no duration"));
                }
            }
        }

        let mut card_ids = HashSet::new();
        let mut card_keys = HashSet::new();
        for (fi, f) in data.flashcards.iter().enumerate() {
            let at = format!("flashcards[{fi}]");
            t.check(Weight::Structural, !f.id.trim().is_empty(), || format!("{at}: id is empty"));
            t.check(Weight::Structural, card_ids.insert(f.id.as_str()), || {
                format!("{at}: duplicate flashcard id '{}'", f.id)
            });
            t.check(Weight::Structural, !f.front.trim().is_empty(), || {
                format!("{at}: front is empty")
            });
            t.check(Weight::Structural, !f.back.trim().is_empty(), || {
                format!("{at}: back is empty")
            });
            t.check(Weight::Business, f.correct_count <= f.review_count, || {
                format!(
                    "{at}: {} correct answers out of {} reviews",
                    f.correct_count, f.review_count
                )
            });
            t.soft(card_keys.insert(flashcard_key(&f.front, &f.back)), || {
                format!("{at}: same front and back as an earlier card")
            });
        }

        let p = &data.progress;
        t.check(
            Weight::Business,
            p.longest_streak_days >= p.current_streak_days,
            || {
                format!(
                    "progress: current streak {} exceeds longest streak {}",
                    p.current_streak_days, p.longest_streak_days
                )
            },
        );

        let prefs = &data.preferences;
        t.check(
            Weight::Business,
            (1..=MINUTES_PER_DAY).contains(&prefs.daily_goal_minutes),
            || {
                format!(
                    "preferences: daily goal of {} minutes is out of range",
                    prefs.daily_goal_minutes
                )
            },
        );
        t.check(Weight::Business, !prefs.language.trim().is_empty(), || {
            "preferences: language is empty".to_string()
        });

        t.finish(ValidationStage::PreMigration, Some(limits.min_integrity_score))
    }

    /// Post-transformation checks: ownership, provenance, nesting.
    #[must_use]
    pub fn validate_transformed_data(
        &self,
        data: &TransformedDataset,
        account_id: &str,
    ) -> ValidationReport {
        let mut t = Tally::default();
        let owned = |owner: &str| owner == account_id;
        let from_guest = |origin: Option<&lum_core::entities::MigrationOrigin>| {
            origin.is_some_and(|o| o.source_guest_id == data.source_guest_id)
        };

        t.check(Weight::Structural, data.account_id == account_id, || {
            format!("dataset targets account '{}', expected '{account_id}'", data.account_id)
        });

        let (mut modules, mut lessons) = (0usize, 0usize);
        for c in &data.curricula {
            t.check(Weight::Structural, owned(&c.account_id), || {
                format!("curriculum {}: owned by '{}'", c.id, c.account_id)
            });
            t.check(Weight::Structural, from_guest(c.origin.as_ref()), || {
                format!("curriculum {}: missing migration origin", c.id)
            });
            let mut module_ids = HashSet::new();
            for m in &c.modules {
                modules += 1;
                t.check(Weight::Structural, owned(&m.account_id), || {
                    format!("module {}/{}: owned by '{}'", c.id, m.id, m.account_id)
                });
                t.check(Weight::Structural, module_ids.insert(m.id.as_str()), || {
                    format!("module {}/{}: duplicate id", c.id, m.id)
                });
                let mut lesson_ids = HashSet::new();
                for l in &m.lessons {
                    lessons += 1;
                    t.check(Weight::Structural, owned(&l.account_id), || {
                        format!("lesson {}/{}/{}: owned by '{}'", c.id, m.id, l.id, l.account_id)
                    });
                    t.check(Weight::Structural, lesson_ids.insert(l.id.as_str()), || {
                        format!("lesson {}/{}/{}: duplicate id", c.id, m.id, l.id)
                    });
                }
            }
        }
        for f in &data.flashcards {
            t.check(Weight::Structural, owned(&f.account_id), || {
                format!("flashcard {}: owned by '{}'", f.id, f.account_id)
            });
            t.check(Weight::Structural, from_guest(f.origin.as_ref()), || {
                format!("flashcard {}: missing migration origin", f.id)
            });
        }
        if let Some(p) = &data.progress {
            t.check(Weight::Structural, owned(&p.account_id) && from_guest(p.origin.as_ref()), || {
                "progress: wrong owner or missing origin".to_string()
            });
        }
        if let Some(p) = &data.preferences {
            t.check(Weight::Structural, owned(&p.account_id) && from_guest(p.origin.as_ref()), || {
                "preferences: wrong owner or missing origin".to_string()
            });
        }

        let s = &data.summary;
        let same = |n: usize, expected: u32| u32::try_from(n).is_ok_and(|n| n == expected);
        let counts_match = same(data.curricula.len(), s.curricula)
            && same(data.flashcards.len(), s.flashcards)
            && same(modules, s.modules)
            && same(lessons, s.lessons);
        t.check(Weight::Structural, counts_match, || {
            "transformed record counts differ from the transformation summary".to_string()
        });

        t.finish(ValidationStage::PostTransformation, None)
    }

    /// Re-read the account and confirm the guest's content landed.
    ///
    /// Every guest curriculum and flashcard key must be present, and stored
    /// counts must equal the resolved final dataset's. Records another guest
    /// migrated into the account are not counted.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Persistence` if the account cannot be read.
    pub async fn validate_migration_results<S: AccountStore>(
        &self,
        guest: &GuestDataset,
        guest_id: &str,
        account_id: &str,
        store: &S,
        resolution: &ConflictResolutionResult,
    ) -> Result<ValidationReport, MigrationError> {
        let expected = &resolution.final_dataset;
        let stored = store.read_account_data(account_id).await?;
        let stored = relevant_records(&stored, expected, |origin| {
            origin.is_some_and(|o| o.source_guest_id == guest_id)
        });
        let mut t = Tally::default();

        let stored_titles: HashSet<String> =
            stored.curricula.iter().map(|c| curriculum_key(&c.title)).collect();
        for c in &guest.curricula {
            t.check(Weight::Structural, stored_titles.contains(&curriculum_key(&c.title)), || {
                format!("curriculum '{}' from guest {guest_id} is missing", c.title)
            });
        }
        let stored_cards: HashSet<String> = stored
            .flashcards
            .iter()
            .map(|f| flashcard_key(&f.front, &f.back))
            .collect();
        for f in &guest.flashcards {
            t.check(
                Weight::Structural,
                stored_cards.contains(&flashcard_key(&f.front, &f.back)),
                || format!("flashcard '{}' from guest {guest_id} is missing", f.front),
            );
        }

        t.check(Weight::Structural, stored.curricula.len() == expected.curricula.len(), || {
            format!(
                "stored {} curricula, expected {}",
                stored.curricula.len(),
                expected.curricula.len()
            )
        });
        t.check(Weight::Structural, stored.lesson_count() == expected.lesson_count(), || {
            format!(
                "stored {} lessons, expected {}",
                stored.lesson_count(),
                expected.lesson_count()
            )
        });
        t.check(Weight::Structural, stored.flashcards.len() == expected.flashcards.len(), || {
            format!(
                "stored {} flashcards, expected {}",
                stored.flashcards.len(),
                expected.flashcards.len()
            )
        });
        t.check(
            Weight::Business,
            stored.progress.is_some() == expected.progress.is_some(),
            || "progress presence differs from the resolved dataset".to_string(),
        );
        t.check(
            Weight::Business,
            stored.preferences.is_some() == expected.preferences.is_some(),
            || "preferences presence differs from the resolved dataset".to_string(),
        );

        Ok(t.finish(ValidationStage::PostMigration, None))
    }
}

/// The stored records a check is responsible for: everything the resolved
/// dataset names plus what `owns` claims. Singletons are kept as stored.
fn relevant_records(
    stored: &AccountDataset,
    expected: &AccountDataset,
    owns: impl Fn(Option<&MigrationOrigin>) -> bool,
) -> AccountDataset {
    AccountDataset {
        account_id: stored.account_id.clone(),
        curricula: stored
            .curricula
            .iter()
            .filter(|c| expected.curriculum(&c.id).is_some() || owns(c.origin.as_ref()))
            .cloned()
            .collect(),
        flashcards: stored
            .flashcards
            .iter()
            .filter(|f| expected.flashcard(&f.id).is_some() || owns(f.origin.as_ref()))
            .cloned()
            .collect(),
        progress: stored.progress.clone(),
        preferences: stored.preferences.clone(),
    }
}

/// Compare what should be stored with what is stored.
///
/// Counts are cross-checked, then every expected entity is looked up by id:
/// absent ones are `Missing`, differing ones `Altered`; stored entities that
/// were not expected are `Unexpected`. Only records `session_id` stamped can
/// be unexpected; other writers to the account are ignored.
#[must_use]
pub fn perform_data_integrity_check(
    session_id: &str,
    source: &AccountDataset,
    migrated: &AccountDataset,
) -> IntegrityCheck {
    let migrated = &relevant_records(migrated, source, |origin| {
        origin.is_some_and(|o| o.session_id == session_id)
    });
    let mut issues = Vec::new();
    let mut matched = 0usize;
    let mut total = 0usize;

    let mut issue = |entity_type, entity_id: &str, problem| {
        issues.push(IntegrityIssue {
            entity_type,
            entity_id: entity_id.to_string(),
            problem,
        });
    };

    if source.curricula.len() != migrated.curricula.len() {
        issue(EntityType::Curriculum, "*", IntegrityProblem::CountMismatch);
    }
    if source.flashcards.len() != migrated.flashcards.len() {
        issue(EntityType::Flashcard, "*", IntegrityProblem::CountMismatch);
    }

    for expected in &source.curricula {
        total += 1;
        match migrated.curriculum(&expected.id) {
            None => issue(EntityType::Curriculum, &expected.id, IntegrityProblem::Missing),
            Some(actual) if !actual.same_content(expected) => {
                issue(EntityType::Curriculum, &expected.id, IntegrityProblem::Altered);
            }
            Some(_) => matched += 1,
        }
    }
    for actual in &migrated.curricula {
        if source.curriculum(&actual.id).is_none() {
            total += 1;
            issue(EntityType::Curriculum, &actual.id, IntegrityProblem::Unexpected);
        }
    }

    for expected in &source.flashcards {
        total += 1;
        match migrated.flashcard(&expected.id) {
            None => issue(EntityType::Flashcard, &expected.id, IntegrityProblem::Missing),
            Some(actual) if !actual.same_content(expected) => {
                issue(EntityType::Flashcard, &expected.id, IntegrityProblem::Altered);
            }
            Some(_) => matched += 1,
        }
    }
    for actual in &migrated.flashcards {
        if source.flashcard(&actual.id).is_none() {
            total += 1;
            issue(EntityType::Flashcard, &actual.id, IntegrityProblem::Unexpected);
        }
    }

    let account = source.account_id.as_str();
    let progress = (
        source.progress.as_ref().map(|p| &p.progress),
        migrated.progress.as_ref().map(|p| &p.progress),
    );
    let preferences = (
        source.preferences.as_ref().map(|p| &p.preferences),
        migrated.preferences.as_ref().map(|p| &p.preferences),
    );
    for (entity, outcome) in [
        (EntityType::Progress, singleton_problem(progress.0, progress.1)),
        (EntityType::Preferences, singleton_problem(preferences.0, preferences.1)),
    ] {
        match outcome {
            SingletonOutcome::Absent => {}
            SingletonOutcome::Matched => {
                total += 1;
                matched += 1;
            }
            SingletonOutcome::Problem(problem) => {
                total += 1;
                issue(entity, account, problem);
            }
        }
    }

    let integrity_score = if total == 0 {
        100
    } else {
        u8::try_from((matched * 100 + total / 2) / total).unwrap_or(100)
    };

    IntegrityCheck {
        session_id: session_id.to_string(),
        integrity_score,
        issues,
    }
}

enum SingletonOutcome {
    Absent,
    Matched,
    Problem(IntegrityProblem),
}

fn singleton_problem<T: PartialEq>(expected: Option<&T>, actual: Option<&T>) -> SingletonOutcome {
    match (expected, actual) {
        (None, None) => SingletonOutcome::Absent,
        (Some(_), None) => SingletonOutcome::Problem(IntegrityProblem::Missing),
        (None, Some(_)) => SingletonOutcome::Problem(IntegrityProblem::Unexpected),
        (Some(e), Some(a)) if e == a => SingletonOutcome::Matched,
        (Some(_), Some(_)) => SingletonOutcome::Problem(IntegrityProblem::Altered),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lum_core::entities::{
        AccountFlashcard, Curriculum, Flashcard, Lesson, Module, Preferences, Progress,
    };
    use lum_core::enums::Difficulty;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transformer::transform;

    fn lesson(id: &str) -> Lesson {
        Lesson {
            id: id.into(),
            title: format!("Lesson {id}"),
            duration_minutes: 5,
            completed: false,
            completed_at: None,
        }
    }

    fn valid_guest() -> GuestDataset {
        GuestDataset {
            curricula: vec![Curriculum {
                id: "c1".into(),
                title: "Chemistry".into(),
                domain: "science".into(),
                created_at: Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap(),
                modules: vec![Module {
                    id: "m1".into(),
                    title: "Atoms".into(),
                    lessons: vec![lesson("l1"), lesson("l2")],
                }],
            }],
            flashcards: vec![Flashcard {
                id: "f1".into(),
                front: "H2O".into(),
                back: "water".into(),
                tags: Default::default(),
                difficulty: Difficulty::Easy,
                review_count: 2,
                correct_count: 2,
                last_reviewed_at: None,
            }],
            progress: Progress::default(),
            preferences: Preferences::default(),
        }
    }

    #[test]
    fn valid_data_scores_full_marks() {
        let report = Validator::default().validate_guest_data(&valid_guest());
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.integrity_score, 100);
        assert_eq!(report.checks_run, report.checks_passed);
        assert_eq!(report.stage, ValidationStage::PreMigration);
    }

    #[test]
    fn duplicate_lesson_id_and_stray_completion_are_errors() {
        let mut guest = valid_guest();
        let module = &mut guest.curricula[0].modules[0];
        module.lessons[1].id = "l1".into();
        module.lessons[0].completed_at = Some(Utc::now());

        let report = Validator::default().validate_guest_data(&guest);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
        assert!(report.integrity_score < 100);
    }

    #[test]
    fn ancestor_id_reuse_is_rejected() {
        let mut guest = valid_guest();
        guest.curricula[0].modules[0].lessons[0].id = "m1".into();
        let report = Validator::default().validate_guest_data(&guest);
        assert!(report.errors.iter().any(|e| e.contains("ancestor")));
    }

    #[test]
    fn business_bounds_come_from_limits() {
        let validator = Validator::new(ValidationLimits {
            max_lessons_per_module: 1,
            ..ValidationLimits::default()
        });
        let report = validator.validate_guest_data(&valid_guest());
        assert!(!report.valid);
        assert!(report.errors[0].contains("lessons exceed the limit of 1"));
    }

    #[test]
    fn overcounted_correct_answers_fail() {
        let mut guest = valid_guest();
        guest.flashcards[0].correct_count = 3;
        let report = Validator::default().validate_guest_data(&guest);
        assert!(!report.valid);
    }

    #[test]
    fn soft_failures_only_fail_below_the_minimum_score() {
        let mut guest = valid_guest();
        for lesson in &mut guest.curricula[0].modules[0].lessons {
            lesson.duration_minutes = 0;
        }

        let lenient = Validator::default().validate_guest_data(&guest);
        assert!(lenient.valid);
        assert_eq!(lenient.warnings.len(), 2);
        assert_eq!(lenient.integrity_score, 97);

        let strict = Validator::new(ValidationLimits {
            min_integrity_score: 100,
            ..ValidationLimits::default()
        });
        let report = strict.validate_guest_data(&guest);
        assert!(!report.valid);
        assert!(report.errors[0].contains("below the minimum of 100"));
    }

    #[test]
    fn empty_dataset_is_valid_with_warning() {
        let report = Validator::default().validate_guest_data(&GuestDataset::default());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn transformed_data_passes_and_foreign_owner_fails() {
        let transformed =
            transform(&valid_guest(), "g1", "acct", "mig-1", Utc::now()).unwrap();
        let validator = Validator::default();
        assert!(validator.validate_transformed_data(&transformed, "acct").valid);

        let mut tampered = transformed;
        tampered.flashcards[0].account_id = "intruder".into();
        tampered.curricula[0].origin = None;
        let report = validator.validate_transformed_data(&tampered, "acct");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.stage, ValidationStage::PostTransformation);
    }

    fn account_card(id: &str, front: &str) -> AccountFlashcard {
        AccountFlashcard {
            id: id.into(),
            account_id: "acct".into(),
            front: front.into(),
            back: "b".into(),
            tags: Default::default(),
            difficulty: Difficulty::Easy,
            review_count: 0,
            correct_count: 0,
            last_reviewed_at: None,
            origin: None,
        }
    }

    #[test]
    fn integrity_check_classifies_differences() {
        let mut source = AccountDataset::empty("acct");
        source.flashcards = vec![account_card("f1", "a"), account_card("f2", "b")];
        let mut migrated = AccountDataset::empty("acct");
        migrated.flashcards = vec![
            account_card("f1", "a (edited)"),
            stamped(account_card("f3", "c"), "mig-1"),
        ];

        let check = perform_data_integrity_check("mig-1", &source, &migrated);
        let problems: Vec<_> = check
            .issues
            .iter()
            .map(|i| (i.entity_id.as_str(), i.problem))
            .collect();
        assert_eq!(problems, vec![
            ("f1", IntegrityProblem::Altered),
            ("f2", IntegrityProblem::Missing),
            ("f3", IntegrityProblem::Unexpected),
        ]);
        assert_eq!(check.integrity_score, 0);
        assert!(!check.is_clean());
    }

    fn stamped(card: AccountFlashcard, session: &str) -> AccountFlashcard {
        AccountFlashcard {
            origin: Some(MigrationOrigin {
                source_guest_id: format!("guest-of-{session}"),
                session_id: session.into(),
                migrated_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            }),
            ..card
        }
    }

    #[test]
    fn records_of_other_writers_are_not_unexpected() {
        let mut source = AccountDataset::empty("acct");
        source.flashcards = vec![account_card("f1", "a")];
        let mut migrated = source.clone();
        migrated.flashcards.push(stamped(account_card("f9", "z"), "mig-2"));
        migrated.flashcards.push(account_card("f8", "typed by hand"));

        let check = perform_data_integrity_check("mig-1", &source, &migrated);
        assert!(check.is_clean(), "{:?}", check.issues);
        assert_eq!(check.integrity_score, 100);
    }

    #[test]
    fn identical_datasets_are_clean() {
        let mut source = AccountDataset::empty("acct");
        source.flashcards = vec![account_card("f1", "a")];
        let check = perform_data_integrity_check("mig-1", &source, &source.clone());
        assert!(check.is_clean());
        assert_eq!(check.integrity_score, 100);
    }
}
