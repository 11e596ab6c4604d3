//! Persistence contracts consumed by the migration engine.
//!
//! The engine only ever talks to storage through these traits, so tests can
//! wrap a real adapter with fault injection and the HTTP entrypoint can swap
//! backends without touching orchestration code.
//!
//! Every mutating call is a single-entity unit. The only multi-entity unit is
//! [`AccountStore::commit_guest_to_account`].

use std::future::Future;

use crate::entities::{
    AccountCurriculum, AccountDataset, AccountFlashcard, AccountLesson, AccountModule,
    AccountPreferences, AccountProgress, CommitReceipt, GuestDataset, GuestUsageStats,
};
use crate::errors::StoreError;

/// Read/write access to account-owned learning content.
pub trait AccountStore: Send + Sync {
    /// Read everything the account currently owns, in stored order.
    fn read_account_data(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<AccountDataset, StoreError>> + Send;

    /// Insert a curriculum header. Modules and lessons are created separately.
    fn create_curriculum(
        &self,
        curriculum: &AccountCurriculum,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a module header at `position` inside an existing curriculum.
    fn create_module(
        &self,
        curriculum_id: &str,
        position: u32,
        module: &AccountModule,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a lesson at `position` inside an existing module.
    fn create_lesson(
        &self,
        curriculum_id: &str,
        module_id: &str,
        position: u32,
        lesson: &AccountLesson,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or fully replace a curriculum and its whole module/lesson tree.
    fn replace_curriculum(
        &self,
        curriculum: &AccountCurriculum,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a flashcard.
    fn create_flashcard(
        &self,
        flashcard: &AccountFlashcard,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or fully replace a flashcard.
    fn replace_flashcard(
        &self,
        flashcard: &AccountFlashcard,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or replace the account's progress record.
    fn save_progress(
        &self,
        progress: &AccountProgress,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or replace the account's preferences record.
    fn save_preferences(
        &self,
        preferences: &AccountPreferences,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a curriculum with its modules and lessons.
    fn delete_curriculum(
        &self,
        account_id: &str,
        curriculum_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_flashcard(
        &self,
        account_id: &str,
        flashcard_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_progress(&self, account_id: &str)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_preferences(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finalize the transfer: mark the guest profile as consumed by `account_id`.
    ///
    /// All-or-nothing. Fails with `StoreError::AlreadyCommitted` if the guest
    /// was already committed.
    fn commit_guest_to_account(
        &self,
        guest_id: &str,
        account_id: &str,
    ) -> impl Future<Output = Result<CommitReceipt, StoreError>> + Send;
}

/// Access to guest profiles held outside any account.
pub trait GuestProfileProvider: Send + Sync {
    /// Load the dataset stored for `guest_id`, if any.
    fn load_guest_dataset(
        &self,
        guest_id: &str,
    ) -> impl Future<Output = Result<Option<GuestDataset>, StoreError>> + Send;

    /// Usage numbers for `guest_id`. Unknown guests report all zeros.
    fn guest_usage_stats(
        &self,
        guest_id: &str,
    ) -> impl Future<Output = Result<GuestUsageStats, StoreError>> + Send;

    /// Whether the guest profile was already committed to an account.
    fn is_guest_consumed(
        &self,
        guest_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
