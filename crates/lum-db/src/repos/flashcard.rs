//! Flashcard repository.

use std::collections::BTreeSet;

use lum_core::entities::AccountFlashcard;

use crate::error::DatabaseError;
use crate::helpers::{
    get_opt_string, get_origin, get_u32, opt_rfc3339, origin_columns, parse_enum, parse_json,
    parse_optional_datetime,
};
use crate::service::LumService;

fn row_to_flashcard(row: &libsql::Row, account_id: &str) -> Result<AccountFlashcard, DatabaseError> {
    let tags: BTreeSet<String> = parse_json(&row.get::<String>(3)?)?;
    Ok(AccountFlashcard {
        id: row.get::<String>(0)?,
        account_id: account_id.to_string(),
        front: row.get::<String>(1)?,
        back: row.get::<String>(2)?,
        tags,
        difficulty: parse_enum(&row.get::<String>(4)?)?,
        review_count: get_u32(row, 5)?,
        correct_count: get_u32(row, 6)?,
        last_reviewed_at: parse_optional_datetime(get_opt_string(row, 7)?.as_deref())?,
        origin: get_origin(row, 8)?,
    })
}

impl LumService {
    pub async fn list_flashcards(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountFlashcard>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, front, back, tags, difficulty, review_count, correct_count, last_reviewed_at,
                        origin_guest_id, origin_session_id, migrated_at
                 FROM flashcards WHERE account_id = ?1 ORDER BY rowid",
                [account_id],
            )
            .await?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next().await? {
            cards.push(row_to_flashcard(&row, account_id)?);
        }
        Ok(cards)
    }

    /// Insert a flashcard, or with `upsert` replace the one stored under the same id.
    pub async fn write_flashcard(
        &self,
        card: &AccountFlashcard,
        upsert: bool,
    ) -> Result<(), DatabaseError> {
        let tags = serde_json::to_string(&card.tags).map_err(|e| DatabaseError::Other(e.into()))?;
        let (guest, session, migrated_at) = origin_columns(card.origin.as_ref());
        let conflict = if upsert {
            " ON CONFLICT (account_id, id) DO UPDATE SET front = excluded.front, back = excluded.back,
               tags = excluded.tags, difficulty = excluded.difficulty,
               review_count = excluded.review_count, correct_count = excluded.correct_count,
               last_reviewed_at = excluded.last_reviewed_at, origin_guest_id = excluded.origin_guest_id,
               origin_session_id = excluded.origin_session_id, migrated_at = excluded.migrated_at"
        } else {
            ""
        };

        let _guard = self.lock_writes().await;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO flashcards (account_id, id, front, back, tags, difficulty, review_count,
                        correct_count, last_reviewed_at, origin_guest_id, origin_session_id, migrated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12){conflict}"
                ),
                libsql::params![
                    card.account_id.as_str(),
                    card.id.as_str(),
                    card.front.as_str(),
                    card.back.as_str(),
                    tags,
                    card.difficulty.as_str(),
                    i64::from(card.review_count),
                    i64::from(card.correct_count),
                    opt_rfc3339(card.last_reviewed_at),
                    guest,
                    session,
                    migrated_at
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_flashcard(&self, account_id: &str, id: &str) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        let deleted = self
            .db()
            .conn()
            .execute(
                "DELETE FROM flashcards WHERE account_id = ?1 AND id = ?2",
                [account_id, id],
            )
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "flashcard",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Number of flashcards in `account_id` that were migrated from `guest_id`.
    pub async fn count_flashcards_from_guest(
        &self,
        account_id: &str,
        guest_id: &str,
    ) -> Result<u32, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT COUNT(*) FROM flashcards WHERE account_id = ?1 AND origin_guest_id = ?2",
                [account_id, guest_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_u32(&row, 0)
    }
}
