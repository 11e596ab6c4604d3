//! Per-account singletons: progress and preferences.

use lum_core::entities::{AccountPreferences, AccountProgress, Preferences, Progress};

use crate::error::DatabaseError;
use crate::helpers::{
    get_bool, get_opt_string, get_origin, get_u32, opt_rfc3339, origin_columns, parse_enum,
    parse_optional_datetime,
};
use crate::service::LumService;

impl LumService {
    pub async fn get_progress(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountProgress>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT total_study_minutes, current_streak_days, longest_streak_days, lessons_completed,
                        cards_reviewed, last_active_at, origin_guest_id, origin_session_id, migrated_at
                 FROM progress WHERE account_id = ?1",
                [account_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(AccountProgress {
            account_id: account_id.to_string(),
            progress: Progress {
                total_study_minutes: get_u32(&row, 0)?,
                current_streak_days: get_u32(&row, 1)?,
                longest_streak_days: get_u32(&row, 2)?,
                lessons_completed: get_u32(&row, 3)?,
                cards_reviewed: get_u32(&row, 4)?,
                last_active_at: parse_optional_datetime(get_opt_string(&row, 5)?.as_deref())?,
            },
            origin: get_origin(&row, 6)?,
        }))
    }

    /// Insert or replace the account's progress row.
    pub async fn put_progress(&self, record: &AccountProgress) -> Result<(), DatabaseError> {
        let p = &record.progress;
        let (guest, session, migrated_at) = origin_columns(record.origin.as_ref());
        let _guard = self.lock_writes().await;
        self.db()
            .conn()
            .execute(
                "INSERT OR REPLACE INTO progress (account_id, total_study_minutes, current_streak_days,
                    longest_streak_days, lessons_completed, cards_reviewed, last_active_at,
                    origin_guest_id, origin_session_id, migrated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                libsql::params![
                    record.account_id.as_str(),
                    i64::from(p.total_study_minutes),
                    i64::from(p.current_streak_days),
                    i64::from(p.longest_streak_days),
                    i64::from(p.lessons_completed),
                    i64::from(p.cards_reviewed),
                    opt_rfc3339(p.last_active_at),
                    guest,
                    session,
                    migrated_at
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_progress(&self, account_id: &str) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        let deleted = self
            .db()
            .conn()
            .execute("DELETE FROM progress WHERE account_id = ?1", [account_id])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "progress",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn get_preferences(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountPreferences>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT daily_goal_minutes, theme, language, notifications_enabled, review_order,
                        origin_guest_id, origin_session_id, migrated_at
                 FROM preferences WHERE account_id = ?1",
                [account_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(AccountPreferences {
            account_id: account_id.to_string(),
            preferences: Preferences {
                daily_goal_minutes: get_u32(&row, 0)?,
                theme: row.get::<String>(1)?,
                language: row.get::<String>(2)?,
                notifications_enabled: get_bool(&row, 3)?,
                review_order: parse_enum(&row.get::<String>(4)?)?,
            },
            origin: get_origin(&row, 5)?,
        }))
    }

    /// Insert or replace the account's preferences row.
    pub async fn put_preferences(&self, record: &AccountPreferences) -> Result<(), DatabaseError> {
        let p = &record.preferences;
        let (guest, session, migrated_at) = origin_columns(record.origin.as_ref());
        let _guard = self.lock_writes().await;
        self.db()
            .conn()
            .execute(
                "INSERT OR REPLACE INTO preferences (account_id, daily_goal_minutes, theme, language,
                    notifications_enabled, review_order, origin_guest_id, origin_session_id, migrated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                libsql::params![
                    record.account_id.as_str(),
                    i64::from(p.daily_goal_minutes),
                    p.theme.as_str(),
                    p.language.as_str(),
                    i64::from(p.notifications_enabled),
                    p.review_order.as_str(),
                    guest,
                    session,
                    migrated_at
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_preferences(&self, account_id: &str) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        let deleted = self
            .db()
            .conn()
            .execute("DELETE FROM preferences WHERE account_id = ?1", [account_id])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "preferences",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }
}
