//! Conflict resolution across strategies on realistic datasets.

mod common;

use pretty_assertions::assert_eq;
use rstest::rstest;

use common::{ACCOUNT, GUEST, at, curriculum, existing_curriculum, flashcard, guest_dataset, lesson, module};
use lum_core::entities::{
    AccountDataset, AccountFlashcard, AccountPreferences, AccountProgress, GuestDataset,
    Preferences, Progress, Resolution,
};
use lum_core::enums::{ConflictStrategy, Difficulty, EntityType};
use lum_migrate::MigrationError;
use lum_migrate::resolver::{GUEST_COPY_SUFFIX, PlannedWrite, WriteAction, resolve};
use lum_migrate::transformer::{TransformedDataset, transform};

fn transformed(data: &GuestDataset) -> TransformedDataset {
    transform(data, GUEST, ACCOUNT, "mig-0000beef", at(10)).unwrap()
}

fn existing() -> AccountDataset {
    AccountDataset {
        curricula: vec![existing_curriculum()],
        ..AccountDataset::empty(ACCOUNT)
    }
}

fn existing_card(id: &str, front: &str, back: &str) -> AccountFlashcard {
    AccountFlashcard {
        id: id.into(),
        account_id: ACCOUNT.into(),
        front: front.into(),
        back: back.into(),
        tags: ["grammar".to_string()].into(),
        difficulty: Difficulty::Hard,
        review_count: 3,
        correct_count: 3,
        last_reviewed_at: Some(at(6)),
        origin: None,
    }
}

#[test]
fn merge_unions_modules_and_keeps_existing_identity() {
    let result = resolve(&transformed(&guest_dataset()), &existing(), ConflictStrategy::MergeWithPreference)
        .unwrap();

    assert_eq!(result.statistics.total_conflicts, 1);
    assert_eq!(result.statistics.resolved_conflicts, 1);
    assert_eq!(result.statistics.by_entity.curricula.detected, 1);
    assert_eq!(result.conflicts[0].resolution, Resolution::Merged);
    assert_eq!(result.conflicts[0].natural_key, "spanish basics");

    let merged = result.final_dataset.curriculum("c1").unwrap();
    assert_eq!(merged.created_at, at(2));
    assert_eq!(merged.origin, None);
    assert_eq!(merged.modules.len(), 2);
    assert_eq!(merged.modules[1].id, "m1-guest");
    assert_eq!(merged.modules[1].lessons.len(), 2);

    let actions: Vec<(EntityType, WriteAction, &str)> = result
        .plan
        .iter()
        .map(|w| (w.entity_type(), w.action(), w.id()))
        .collect();
    assert_eq!(actions[0], (EntityType::Curriculum, WriteAction::Update, "c1"));
    assert_eq!(actions[1], (EntityType::Curriculum, WriteAction::Insert, "c2"));
    assert_eq!(actions.len(), 2 + 5 + 1);
}

#[test]
fn merge_of_matching_lessons_keeps_the_higher_completion() {
    let mut data = GuestDataset::default();
    data.curricula.push(curriculum(
        "g1",
        "  spanish   BASICS ",
        vec![module("gm", "greetings", vec![lesson("gl", "HOLA", true)])],
    ));
    let mut base = existing();
    base.curricula[0].modules[0].lessons[0].completed = false;
    base.curricula[0].modules[0].lessons[0].completed_at = None;

    let result = resolve(&transformed(&data), &base, ConflictStrategy::MergeWithPreference).unwrap();

    let merged = result.final_dataset.curriculum("c1").unwrap();
    assert_eq!(merged.modules.len(), 1);
    let only = &merged.modules[0].lessons;
    assert_eq!(only.len(), 1);
    assert!(only[0].completed);
    assert_eq!(only[0].completed_at, Some(at(3)));
}

#[test]
fn merging_what_is_already_there_is_identical_and_writes_nothing() {
    let mut data = GuestDataset::default();
    data.curricula.push(curriculum(
        "c9",
        "Spanish Basics",
        vec![module("m9", "Greetings", vec![lesson("l9", "Hola", false)])],
    ));

    let result = resolve(&transformed(&data), &existing(), ConflictStrategy::MergeWithPreference).unwrap();

    assert_eq!(result.conflicts[0].resolution, Resolution::Identical);
    assert!(result.plan.is_empty());
    assert_eq!(result.final_dataset, existing());
}

#[test]
fn flashcard_merge_sums_counters_and_unions_tags() {
    let mut data = GuestDataset::default();
    data.flashcards.push(flashcard("f1", "Hola", "Hello"));
    let base = AccountDataset {
        flashcards: vec![existing_card("x1", "hola", "hello ")],
        ..AccountDataset::empty(ACCOUNT)
    };

    let result = resolve(&transformed(&data), &base, ConflictStrategy::MergeWithPreference).unwrap();

    let card = &result.final_dataset.flashcards[0];
    assert_eq!(result.final_dataset.flashcards.len(), 1);
    assert_eq!(card.id, "x1");
    assert_eq!(card.difficulty, Difficulty::Hard);
    assert_eq!(card.review_count, 5);
    assert_eq!(card.correct_count, 4);
    assert_eq!(card.last_reviewed_at, Some(at(6)));
    assert_eq!(
        card.tags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["grammar", "vocab"]
    );
    assert!(matches!(
        &result.plan[..],
        [PlannedWrite::Flashcard { action: WriteAction::Update, .. }]
    ));
}

#[test]
fn guest_priority_replaces_content_under_the_existing_id() {
    let result = resolve(&transformed(&guest_dataset()), &existing(), ConflictStrategy::GuestPriority).unwrap();

    let replaced = result.final_dataset.curriculum("c1").unwrap();
    assert_eq!(replaced.modules.len(), 1);
    assert_eq!(replaced.modules[0].title, "Food");
    assert_eq!(replaced.origin.as_ref().unwrap().source_guest_id, GUEST);
    assert_eq!(result.conflicts[0].resolution, Resolution::GuestKept);
}

#[test]
fn existing_priority_drops_the_guest_record() {
    let result = resolve(&transformed(&guest_dataset()), &existing(), ConflictStrategy::ExistingPriority).unwrap();

    assert_eq!(result.final_dataset.curriculum("c1"), Some(&existing_curriculum()));
    assert_eq!(result.conflicts[0].resolution, Resolution::ExistingKept);
    assert!(result.plan.iter().all(|w| w.id() != "c1"));
}

#[test]
fn create_duplicate_keeps_both_with_suffixes() {
    let result = resolve(&transformed(&guest_dataset()), &existing(), ConflictStrategy::CreateDuplicate).unwrap();

    let copy = result.final_dataset.curriculum("c1-guest").unwrap();
    assert_eq!(copy.title, format!("Spanish Basics{GUEST_COPY_SUFFIX}"));
    assert_eq!(result.final_dataset.curricula.len(), 3);
    assert_eq!(result.conflicts[0].resolution, Resolution::Duplicated);
}

#[test]
fn colliding_ids_with_different_keys_are_disambiguated() {
    let mut data = GuestDataset::default();
    data.curricula.push(curriculum("c1", "German Basics", vec![]));
    data.curricula.push(curriculum("c1-guest", "Italian Basics", vec![]));
    data.curricula.push(curriculum("c3", "Dutch Basics", vec![]));

    let result = resolve(&transformed(&data), &existing(), ConflictStrategy::MergeWithPreference).unwrap();

    let ids: Vec<&str> = result.final_dataset.curricula.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c1-guest", "c1-guest-guest", "c3"]);
    assert_eq!(result.statistics.total_conflicts, 0);
}

fn progress(minutes: u32) -> Progress {
    Progress {
        total_study_minutes: minutes,
        current_streak_days: 1,
        longest_streak_days: 3,
        ..Progress::default()
    }
}

fn with_singletons() -> AccountDataset {
    AccountDataset {
        progress: Some(AccountProgress {
            account_id: ACCOUNT.into(),
            progress: progress(30),
            origin: None,
        }),
        preferences: Some(AccountPreferences {
            account_id: ACCOUNT.into(),
            preferences: Preferences {
                theme: "dark".into(),
                ..Preferences::default()
            },
            origin: None,
        }),
        ..AccountDataset::empty(ACCOUNT)
    }
}

fn singleton_guest() -> GuestDataset {
    GuestDataset {
        progress: progress(15),
        preferences: Preferences {
            theme: "light-contrast".into(),
            ..Preferences::default()
        },
        ..GuestDataset::default()
    }
}

#[test]
fn singleton_merge_combines_progress_and_keeps_existing_preferences() {
    let result = resolve(&transformed(&singleton_guest()), &with_singletons(), ConflictStrategy::MergeWithPreference)
        .unwrap();

    assert_eq!(result.statistics.total_conflicts, 2);
    let merged = result.final_dataset.progress.unwrap();
    assert_eq!(merged.progress.total_study_minutes, 45);
    assert_eq!(merged.origin, None);
    assert_eq!(result.final_dataset.preferences.unwrap().preferences.theme, "dark");
    assert_eq!(result.plan.len(), 1);
}

#[rstest]
#[case::differing(15, true)]
#[case::identical(30, false)]
fn singletons_cannot_be_duplicated_when_they_differ(#[case] minutes: u32, #[case] fails: bool) {
    let guest = GuestDataset {
        progress: progress(minutes),
        ..GuestDataset::default()
    };

    let result = resolve(&transformed(&guest), &with_singletons(), ConflictStrategy::CreateDuplicate);

    if fails {
        assert!(matches!(result, Err(MigrationError::ConflictResolution(_))));
    } else {
        let result = result.unwrap();
        assert_eq!(result.conflicts[0].resolution, Resolution::Identical);
        assert_eq!(result.statistics.resolved_conflicts, 1);
    }
}

#[rstest]
#[case(ConflictStrategy::MergeWithPreference)]
#[case(ConflictStrategy::GuestPriority)]
#[case(ConflictStrategy::ExistingPriority)]
#[case(ConflictStrategy::CreateDuplicate)]
fn resolution_is_deterministic(#[case] strategy: ConflictStrategy) {
    let input = transformed(&guest_dataset());
    let base = existing();

    let first = resolve(&input, &base, strategy).unwrap();
    let second = resolve(&input, &base, strategy).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.statistics.total_conflicts, first.statistics.resolved_conflicts);
}

#[test]
fn foreign_account_data_is_refused() {
    let result = resolve(
        &transformed(&guest_dataset()),
        &AccountDataset::empty("someone-else"),
        ConflictStrategy::MergeWithPreference,
    );
    assert!(matches!(result, Err(MigrationError::ConflictResolution(_))));
}
