use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::AccountDataset;

/// Pre-migration snapshot of the target account.
///
/// At most one unconfirmed checkpoint exists per session and per guest.
/// Once `confirmed`, rollback against it is refused.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub guest_id: String,
    pub account_id: String,
    pub snapshot: AccountDataset,
    pub confirmed: bool,
    pub rolled_back: bool,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Rollback is allowed until success is confirmed or a rollback already ran.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.confirmed && !self.rolled_back
    }
}
