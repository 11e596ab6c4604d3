//! Repository methods on `LumService`, one module per stored entity.

pub mod curriculum;
pub mod flashcard;
pub mod guest;
pub mod profile;

use lum_core::entities::AccountDataset;

use crate::error::DatabaseError;
use crate::service::LumService;

impl LumService {
    /// Read everything an account owns, in stored order.
    pub async fn load_account(&self, account_id: &str) -> Result<AccountDataset, DatabaseError> {
        Ok(AccountDataset {
            account_id: account_id.to_string(),
            curricula: self.list_curricula(account_id).await?,
            flashcards: self.list_flashcards(account_id).await?,
            progress: self.get_progress(account_id).await?,
            preferences: self.get_preferences(account_id).await?,
        })
    }
}
