//! Shared fixtures for engine tests: a fault-injecting store wrapped around
//! an in-memory `LumService`, plus guest and account builders.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use lum_config::MigrationConfig;
use lum_core::entities::{
    AccountCurriculum, AccountDataset, AccountFlashcard, AccountLesson, AccountModule,
    AccountPreferences, AccountProgress, CommitReceipt, Curriculum, Flashcard, GuestDataset,
    GuestUsageStats, Lesson, Module, Preferences, Progress,
};
use lum_core::enums::Difficulty;
use lum_core::errors::StoreError;
use lum_core::store::{AccountStore, GuestProfileProvider};
use lum_db::service::LumService;
use lum_migrate::{MigrationEngine, MigrationRequest, SessionLogger};

pub const GUEST: &str = "guest-1";
pub const ACCOUNT: &str = "acct-1";

/// Faults to inject. Read once per call, never held across an await.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_commit: bool,
    /// Stall after a successful commit before returning the receipt.
    pub commit_delay: Option<Duration>,
    /// Let this many flashcard inserts through, fail the rest.
    pub fail_flashcard_create_after: Option<usize>,
    pub fail_flashcard_delete: bool,
    pub fail_account_read_after: Option<usize>,
    pub read_delay: Option<Duration>,
    pub write_delay: Option<Duration>,
}

pub struct FaultyStore {
    inner: LumService,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<&'static str>>,
    flashcard_creates: AtomicUsize,
    account_reads: AtomicUsize,
}

fn injected(what: &str) -> StoreError {
    StoreError::Backend(format!("injected {what} failure"))
}

impl FaultyStore {
    pub async fn new() -> Arc<Self> {
        Self::with_faults(Faults::default()).await
    }

    pub async fn with_faults(faults: Faults) -> Arc<Self> {
        Arc::new(Self {
            inner: LumService::new_local(":memory:").await.unwrap(),
            faults: Mutex::new(faults),
            calls: Mutex::new(Vec::new()),
            flashcard_creates: AtomicUsize::new(0),
            account_reads: AtomicUsize::new(0),
        })
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    pub fn faults(&self) -> Faults {
        self.faults.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub const fn inner(&self) -> &LumService {
        &self.inner
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn write_delay(&self) {
        if let Some(delay) = self.faults().write_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn is_mutating(call: &str) -> bool {
    !matches!(
        call,
        "read_account_data" | "load_guest_dataset" | "guest_usage_stats" | "is_guest_consumed"
    )
}

impl AccountStore for FaultyStore {
    async fn read_account_data(&self, account_id: &str) -> Result<AccountDataset, StoreError> {
        self.record("read_account_data");
        let faults = self.faults();
        if let Some(delay) = faults.read_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.account_reads.fetch_add(1, Ordering::SeqCst);
        if faults.fail_account_read_after.is_some_and(|limit| n >= limit) {
            return Err(injected("account read"));
        }
        self.inner.read_account_data(account_id).await
    }

    async fn create_curriculum(&self, curriculum: &AccountCurriculum) -> Result<(), StoreError> {
        self.record("create_curriculum");
        self.write_delay().await;
        self.inner.create_curriculum(curriculum).await
    }

    async fn create_module(
        &self,
        curriculum_id: &str,
        position: u32,
        module: &AccountModule,
    ) -> Result<(), StoreError> {
        self.record("create_module");
        self.inner.create_module(curriculum_id, position, module).await
    }

    async fn create_lesson(
        &self,
        curriculum_id: &str,
        module_id: &str,
        position: u32,
        lesson: &AccountLesson,
    ) -> Result<(), StoreError> {
        self.record("create_lesson");
        self.inner
            .create_lesson(curriculum_id, module_id, position, lesson)
            .await
    }

    async fn replace_curriculum(&self, curriculum: &AccountCurriculum) -> Result<(), StoreError> {
        self.record("replace_curriculum");
        self.inner.replace_curriculum(curriculum).await
    }

    async fn create_flashcard(&self, flashcard: &AccountFlashcard) -> Result<(), StoreError> {
        self.record("create_flashcard");
        self.write_delay().await;
        let n = self.flashcard_creates.fetch_add(1, Ordering::SeqCst);
        if self
            .faults()
            .fail_flashcard_create_after
            .is_some_and(|limit| n >= limit)
        {
            return Err(injected("flashcard insert"));
        }
        self.inner.create_flashcard(flashcard).await
    }

    async fn replace_flashcard(&self, flashcard: &AccountFlashcard) -> Result<(), StoreError> {
        self.record("replace_flashcard");
        self.inner.replace_flashcard(flashcard).await
    }

    async fn save_progress(&self, progress: &AccountProgress) -> Result<(), StoreError> {
        self.record("save_progress");
        self.inner.save_progress(progress).await
    }

    async fn save_preferences(&self, preferences: &AccountPreferences) -> Result<(), StoreError> {
        self.record("save_preferences");
        self.inner.save_preferences(preferences).await
    }

    async fn delete_curriculum(&self, account_id: &str, curriculum_id: &str) -> Result<(), StoreError> {
        self.record("delete_curriculum");
        self.inner.delete_curriculum(account_id, curriculum_id).await
    }

    async fn delete_flashcard(&self, account_id: &str, flashcard_id: &str) -> Result<(), StoreError> {
        self.record("delete_flashcard");
        if self.faults().fail_flashcard_delete {
            return Err(injected("flashcard delete"));
        }
        self.inner.delete_flashcard(account_id, flashcard_id).await
    }

    async fn delete_progress(&self, account_id: &str) -> Result<(), StoreError> {
        self.record("delete_progress");
        self.inner.delete_progress(account_id).await
    }

    async fn delete_preferences(&self, account_id: &str) -> Result<(), StoreError> {
        self.record("delete_preferences");
        self.inner.delete_preferences(account_id).await
    }

    async fn commit_guest_to_account(
        &self,
        guest_id: &str,
        account_id: &str,
    ) -> Result<CommitReceipt, StoreError> {
        self.record("commit_guest_to_account");
        let faults = self.faults();
        if faults.fail_commit {
            return Err(injected("commit"));
        }
        let receipt = self.inner.commit_guest_to_account(guest_id, account_id).await?;
        if let Some(delay) = faults.commit_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(receipt)
    }
}

impl GuestProfileProvider for FaultyStore {
    async fn load_guest_dataset(&self, guest_id: &str) -> Result<Option<GuestDataset>, StoreError> {
        self.record("load_guest_dataset");
        self.inner.load_guest_dataset(guest_id).await
    }

    async fn guest_usage_stats(&self, guest_id: &str) -> Result<GuestUsageStats, StoreError> {
        self.record("guest_usage_stats");
        self.inner.guest_usage_stats(guest_id).await
    }

    async fn is_guest_consumed(&self, guest_id: &str) -> Result<bool, StoreError> {
        self.record("is_guest_consumed");
        self.inner.is_guest_consumed(guest_id).await
    }
}

pub fn engine(store: &Arc<FaultyStore>) -> MigrationEngine<FaultyStore, FaultyStore> {
    MigrationEngine::new(
        Arc::clone(store),
        Arc::clone(store),
        Arc::new(SessionLogger::in_memory()),
        &MigrationConfig::default(),
    )
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, day, 9, 0, 0).unwrap()
}

pub fn lesson(id: &str, title: &str, completed: bool) -> Lesson {
    Lesson {
        id: id.into(),
        title: title.into(),
        duration_minutes: 10,
        completed,
        completed_at: completed.then(|| at(3)),
    }
}

pub fn curriculum(id: &str, title: &str, modules: Vec<Module>) -> Curriculum {
    Curriculum {
        id: id.into(),
        title: title.into(),
        domain: "languages".into(),
        created_at: at(1),
        modules,
    }
}

pub fn module(id: &str, title: &str, lessons: Vec<Lesson>) -> Module {
    Module {
        id: id.into(),
        title: title.into(),
        lessons,
    }
}

pub fn flashcard(id: &str, front: &str, back: &str) -> Flashcard {
    Flashcard {
        id: id.into(),
        front: front.into(),
        back: back.into(),
        tags: BTreeSet::from(["vocab".to_string()]),
        difficulty: Difficulty::Easy,
        review_count: 2,
        correct_count: 1,
        last_reviewed_at: Some(at(4)),
    }
}

/// Two curricula, five flashcards, some progress. The first curriculum's
/// title collides with [`seed_account`].
pub fn guest_dataset() -> GuestDataset {
    GuestDataset {
        curricula: vec![
            curriculum(
                "c1",
                "Spanish Basics",
                vec![module(
                    "m1",
                    "Food",
                    vec![lesson("l1", "Fruit", true), lesson("l2", "Drinks", false)],
                )],
            ),
            curriculum(
                "c2",
                "French Basics",
                vec![module("m1", "Greetings", vec![lesson("l1", "Bonjour", false)])],
            ),
        ],
        flashcards: (1..=5)
            .map(|n| flashcard(&format!("f{n}"), &format!("word {n}"), &format!("meaning {n}")))
            .collect(),
        progress: Progress {
            total_study_minutes: 45,
            current_streak_days: 2,
            longest_streak_days: 4,
            lessons_completed: 1,
            cards_reviewed: 10,
            last_active_at: Some(at(4)),
        },
        preferences: Preferences::default(),
    }
}

/// The account's own "Spanish Basics", stored under the guest's first id.
pub fn existing_curriculum() -> AccountCurriculum {
    AccountCurriculum {
        id: "c1".into(),
        account_id: ACCOUNT.into(),
        title: "Spanish Basics".into(),
        domain: "languages".into(),
        created_at: at(2),
        modules: vec![AccountModule {
            id: "m1".into(),
            account_id: ACCOUNT.into(),
            title: "Greetings".into(),
            lessons: vec![AccountLesson {
                id: "l1".into(),
                account_id: ACCOUNT.into(),
                title: "Hola".into(),
                duration_minutes: 5,
                completed: true,
                completed_at: Some(at(2)),
            }],
        }],
        origin: None,
    }
}

pub async fn seed_account(store: &FaultyStore) -> AccountDataset {
    store
        .inner()
        .replace_curriculum(&existing_curriculum())
        .await
        .unwrap();
    store.inner().read_account_data(ACCOUNT).await.unwrap()
}

pub fn request(guest_data: GuestDataset) -> MigrationRequest {
    MigrationRequest {
        guest_id: GUEST.into(),
        account_id: ACCOUNT.into(),
        guest_data,
        strategy: None,
    }
}
