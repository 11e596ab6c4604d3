//! Guest profile repository.
//!
//! A guest profile stores the guest's dataset as a JSON document plus the
//! commit marker written when the profile is migrated into an account.

use chrono::{DateTime, Utc};
use lum_core::entities::{CommitReceipt, GuestDataset, GuestUsageStats};
use lum_core::ids::PREFIX_COMMIT;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_json};
use crate::service::LumService;

/// Commit state of a guest profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestCommit {
    pub account_id: String,
    pub commit_id: String,
    pub migrated_at: DateTime<Utc>,
}

impl LumService {
    /// Store (or overwrite) the dataset of a guest that has not been migrated yet.
    pub async fn save_guest_dataset(
        &self,
        guest_id: &str,
        dataset: &GuestDataset,
    ) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        if let Some(commit) = self.guest_commit(guest_id).await? {
            return Err(DatabaseError::AlreadyCommitted {
                guest_id: guest_id.to_string(),
                account_id: commit.account_id,
            });
        }
        let json = serde_json::to_string(dataset).map_err(|e| DatabaseError::Other(e.into()))?;
        let now = Utc::now().to_rfc3339();

        self.db()
            .conn()
            .execute(
                "INSERT INTO guest_profiles (guest_id, dataset, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (guest_id) DO UPDATE SET dataset = excluded.dataset, updated_at = excluded.updated_at",
                libsql::params![guest_id, json, now],
            )
            .await?;
        tracing::debug!(guest = guest_id, "guest dataset saved");
        Ok(())
    }

    pub async fn get_guest_dataset(
        &self,
        guest_id: &str,
    ) -> Result<Option<GuestDataset>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT dataset FROM guest_profiles WHERE guest_id = ?1",
                [guest_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        get_opt_string(&row, 0)?
            .map(|json| parse_json(&json))
            .transpose()
    }

    pub async fn guest_commit(&self, guest_id: &str) -> Result<Option<GuestCommit>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT migrated_to, commit_id, migrated_at FROM guest_profiles
                 WHERE guest_id = ?1 AND migrated_to IS NOT NULL",
                [guest_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(GuestCommit {
            account_id: row.get::<String>(0)?,
            commit_id: get_opt_string(&row, 1)?.unwrap_or_default(),
            migrated_at: parse_datetime(&row.get::<String>(2)?)?,
        }))
    }

    pub async fn usage_stats(&self, guest_id: &str) -> Result<GuestUsageStats, DatabaseError> {
        let consumed = self.guest_commit(guest_id).await?.is_some();
        Ok(match self.get_guest_dataset(guest_id).await? {
            Some(dataset) => GuestUsageStats::from_dataset(guest_id, &dataset, consumed),
            None => GuestUsageStats {
                guest_id: guest_id.to_string(),
                consumed,
                ..GuestUsageStats::default()
            },
        })
    }

    /// Mark the guest as consumed by `account_id`.
    ///
    /// Runs in one transaction; a guest can only ever be committed once.
    /// Guests without a stored profile get a bare marker row. Everything that
    /// can fail happens before the transaction commits, so an `Err` always
    /// means the guest is still unconsumed.
    pub async fn commit_guest(
        &self,
        guest_id: &str,
        account_id: &str,
    ) -> Result<CommitReceipt, DatabaseError> {
        let commit_id = self.db().generate_id(PREFIX_COMMIT).await?;
        let now = Utc::now();

        let guard = self.lock_writes().await;
        // Counted under the write lock, so they match the committed state.
        let curricula = self.count_curricula_from_guest(account_id, guest_id).await?;
        let flashcards = self.count_flashcards_from_guest(account_id, guest_id).await?;
        let tx = self.db().conn().transaction().await?;

        let mut rows = tx
            .query(
                "SELECT migrated_to FROM guest_profiles WHERE guest_id = ?1",
                [guest_id],
            )
            .await?;
        if let Some(row) = rows.next().await?
            && let Some(existing) = get_opt_string(&row, 0)?
        {
            return Err(DatabaseError::AlreadyCommitted {
                guest_id: guest_id.to_string(),
                account_id: existing,
            });
        }
        drop(rows);

        tx.execute(
            "INSERT INTO guest_profiles (guest_id, created_at, updated_at, migrated_to, migrated_at, commit_id)
             VALUES (?1, ?2, ?2, ?3, ?2, ?4)
             ON CONFLICT (guest_id) DO UPDATE SET migrated_to = excluded.migrated_to,
                migrated_at = excluded.migrated_at, commit_id = excluded.commit_id,
                updated_at = excluded.updated_at",
            libsql::params![guest_id, now.to_rfc3339(), account_id, commit_id.as_str()],
        )
        .await?;
        tx.commit().await?;
        drop(guard);

        let receipt = CommitReceipt {
            commit_id,
            guest_id: guest_id.to_string(),
            account_id: account_id.to_string(),
            committed_at: now,
            curricula,
            flashcards,
        };
        tracing::info!(
            guest = guest_id,
            account = account_id,
            commit = %receipt.commit_id,
            "guest committed to account"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use lum_core::entities::{AccountFlashcard, Flashcard, MigrationOrigin, Progress};
    use lum_core::enums::Difficulty;
    use pretty_assertions::assert_eq;

    use super::*;

    fn dataset() -> GuestDataset {
        GuestDataset {
            flashcards: vec![Flashcard {
                id: "f1".into(),
                front: "hola".into(),
                back: "hello".into(),
                tags: Default::default(),
                difficulty: Difficulty::Easy,
                review_count: 2,
                correct_count: 1,
                last_reviewed_at: None,
            }],
            progress: Progress {
                total_study_minutes: 25,
                ..Progress::default()
            },
            ..GuestDataset::default()
        }
    }

    #[tokio::test]
    async fn saved_dataset_loads_back_with_stats() {
        let svc = LumService::new_local(":memory:").await.unwrap();
        svc.save_guest_dataset("g1", &dataset()).await.unwrap();

        assert_eq!(svc.get_guest_dataset("g1").await.unwrap(), Some(dataset()));
        let stats = svc.usage_stats("g1").await.unwrap();
        assert_eq!(stats.flashcards, 1);
        assert_eq!(stats.study_minutes, 25);
        assert!(!stats.consumed);
    }

    #[tokio::test]
    async fn unknown_guest_has_no_dataset_and_zero_stats() {
        let svc = LumService::new_local(":memory:").await.unwrap();
        assert_eq!(svc.get_guest_dataset("ghost").await.unwrap(), None);
        let stats = svc.usage_stats("ghost").await.unwrap();
        assert!(!stats.has_content());
        assert_eq!(stats.guest_id, "ghost");
    }

    #[tokio::test]
    async fn commit_happens_once() {
        let svc = LumService::new_local(":memory:").await.unwrap();
        svc.save_guest_dataset("g1", &dataset()).await.unwrap();

        let receipt = svc.commit_guest("g1", "acct").await.unwrap();
        assert!(receipt.commit_id.starts_with("cmt-"));
        assert_eq!(receipt.flashcards, 0);

        let err = svc.commit_guest("g1", "other").await.unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyCommitted { ref account_id, .. } if account_id == "acct"));
        assert!(svc.usage_stats("g1").await.unwrap().consumed);
        assert!(svc.save_guest_dataset("g1", &dataset()).await.is_err());
    }

    #[tokio::test]
    async fn receipt_counts_the_guests_migrated_records() {
        let svc = LumService::new_local(":memory:").await.unwrap();
        let migrated = AccountFlashcard {
            id: "f1".into(),
            account_id: "acct".into(),
            front: "hola".into(),
            back: "hello".into(),
            tags: Default::default(),
            difficulty: Difficulty::Easy,
            review_count: 0,
            correct_count: 0,
            last_reviewed_at: None,
            origin: Some(MigrationOrigin {
                source_guest_id: "g1".into(),
                session_id: "mig-00000001".into(),
                migrated_at: Utc::now(),
            }),
        };
        svc.write_flashcard(&migrated, false).await.unwrap();
        svc.write_flashcard(
            &AccountFlashcard {
                id: "f2".into(),
                origin: None,
                ..migrated.clone()
            },
            false,
        )
        .await
        .unwrap();

        let receipt = svc.commit_guest("g1", "acct").await.unwrap();
        assert_eq!(receipt.flashcards, 1);
        assert_eq!(receipt.curricula, 0);
        assert_eq!(
            svc.guest_commit("g1").await.unwrap().map(|c| c.commit_id),
            Some(receipt.commit_id)
        );
    }

    #[tokio::test]
    async fn commit_without_profile_writes_marker() {
        let svc = LumService::new_local(":memory:").await.unwrap();
        svc.commit_guest("inline-guest", "acct").await.unwrap();
        let commit = svc.guest_commit("inline-guest").await.unwrap().unwrap();
        assert_eq!(commit.account_id, "acct");
        assert_eq!(svc.get_guest_dataset("inline-guest").await.unwrap(), None);
    }
}
