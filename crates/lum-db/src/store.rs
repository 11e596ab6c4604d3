//! `lum_core::store` trait implementations for `LumService`.

use lum_core::entities::{
    AccountCurriculum, AccountDataset, AccountFlashcard, AccountLesson, AccountModule,
    AccountPreferences, AccountProgress, CommitReceipt, GuestDataset, GuestUsageStats,
};
use lum_core::errors::StoreError;
use lum_core::store::{AccountStore, GuestProfileProvider};

use crate::service::LumService;

impl AccountStore for LumService {
    async fn read_account_data(&self, account_id: &str) -> Result<AccountDataset, StoreError> {
        Ok(self.load_account(account_id).await?)
    }

    async fn create_curriculum(&self, curriculum: &AccountCurriculum) -> Result<(), StoreError> {
        Ok(self.insert_curriculum(curriculum).await?)
    }

    async fn create_module(
        &self,
        curriculum_id: &str,
        position: u32,
        module: &AccountModule,
    ) -> Result<(), StoreError> {
        Ok(self.insert_module(curriculum_id, position, module).await?)
    }

    async fn create_lesson(
        &self,
        curriculum_id: &str,
        module_id: &str,
        position: u32,
        lesson: &AccountLesson,
    ) -> Result<(), StoreError> {
        Ok(self
            .insert_lesson(curriculum_id, module_id, position, lesson)
            .await?)
    }

    async fn replace_curriculum(&self, curriculum: &AccountCurriculum) -> Result<(), StoreError> {
        Ok(self.upsert_curriculum(curriculum).await?)
    }

    async fn create_flashcard(&self, flashcard: &AccountFlashcard) -> Result<(), StoreError> {
        Ok(self.write_flashcard(flashcard, false).await?)
    }

    async fn replace_flashcard(&self, flashcard: &AccountFlashcard) -> Result<(), StoreError> {
        Ok(self.write_flashcard(flashcard, true).await?)
    }

    async fn save_progress(&self, progress: &AccountProgress) -> Result<(), StoreError> {
        Ok(self.put_progress(progress).await?)
    }

    async fn save_preferences(&self, preferences: &AccountPreferences) -> Result<(), StoreError> {
        Ok(self.put_preferences(preferences).await?)
    }

    async fn delete_curriculum(
        &self,
        account_id: &str,
        curriculum_id: &str,
    ) -> Result<(), StoreError> {
        Ok(self.remove_curriculum(account_id, curriculum_id).await?)
    }

    async fn delete_flashcard(&self, account_id: &str, flashcard_id: &str) -> Result<(), StoreError> {
        Ok(self.remove_flashcard(account_id, flashcard_id).await?)
    }

    async fn delete_progress(&self, account_id: &str) -> Result<(), StoreError> {
        Ok(self.remove_progress(account_id).await?)
    }

    async fn delete_preferences(&self, account_id: &str) -> Result<(), StoreError> {
        Ok(self.remove_preferences(account_id).await?)
    }

    async fn commit_guest_to_account(
        &self,
        guest_id: &str,
        account_id: &str,
    ) -> Result<CommitReceipt, StoreError> {
        Ok(self.commit_guest(guest_id, account_id).await?)
    }
}

impl GuestProfileProvider for LumService {
    async fn load_guest_dataset(&self, guest_id: &str) -> Result<Option<GuestDataset>, StoreError> {
        Ok(self.get_guest_dataset(guest_id).await?)
    }

    async fn guest_usage_stats(&self, guest_id: &str) -> Result<GuestUsageStats, StoreError> {
        Ok(self.usage_stats(guest_id).await?)
    }

    async fn is_guest_consumed(&self, guest_id: &str) -> Result<bool, StoreError> {
        Ok(self.guest_commit(guest_id).await?.is_some())
    }
}
