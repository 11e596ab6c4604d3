//! Curriculum repository: headers, modules, and lessons.

use std::collections::HashMap;

use lum_core::entities::{AccountCurriculum, AccountLesson, AccountModule};

use crate::error::DatabaseError;
use crate::helpers::{
    get_bool, get_opt_string, get_origin, get_u32, opt_rfc3339, origin_columns, parse_datetime,
    parse_optional_datetime,
};
use crate::service::LumService;

fn row_to_curriculum(row: &libsql::Row, account_id: &str) -> Result<AccountCurriculum, DatabaseError> {
    Ok(AccountCurriculum {
        id: row.get::<String>(0)?,
        account_id: account_id.to_string(),
        title: row.get::<String>(1)?,
        domain: row.get::<String>(2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
        modules: Vec::new(),
        origin: get_origin(row, 4)?,
    })
}

fn row_to_lesson(row: &libsql::Row, account_id: &str) -> Result<AccountLesson, DatabaseError> {
    Ok(AccountLesson {
        id: row.get::<String>(2)?,
        account_id: account_id.to_string(),
        title: row.get::<String>(3)?,
        duration_minutes: get_u32(row, 4)?,
        completed: get_bool(row, 5)?,
        completed_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
    })
}

async fn write_header(
    conn: &libsql::Connection,
    curriculum: &AccountCurriculum,
    upsert: bool,
) -> Result<(), DatabaseError> {
    let (guest, session, migrated_at) = origin_columns(curriculum.origin.as_ref());
    let conflict = if upsert {
        " ON CONFLICT (account_id, id) DO UPDATE SET title = excluded.title, domain = excluded.domain,
           created_at = excluded.created_at, origin_guest_id = excluded.origin_guest_id,
           origin_session_id = excluded.origin_session_id, migrated_at = excluded.migrated_at"
    } else {
        ""
    };
    conn.execute(
        &format!(
            "INSERT INTO curricula (account_id, id, title, domain, created_at, origin_guest_id, origin_session_id, migrated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8){conflict}"
        ),
        libsql::params![
            curriculum.account_id.as_str(),
            curriculum.id.as_str(),
            curriculum.title.as_str(),
            curriculum.domain.as_str(),
            curriculum.created_at.to_rfc3339(),
            guest,
            session,
            migrated_at
        ],
    )
    .await?;
    Ok(())
}

async fn write_module(
    conn: &libsql::Connection,
    curriculum_id: &str,
    position: u32,
    module: &AccountModule,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO modules (account_id, curriculum_id, id, position, title) VALUES (?1, ?2, ?3, ?4, ?5)",
        libsql::params![
            module.account_id.as_str(),
            curriculum_id,
            module.id.as_str(),
            i64::from(position),
            module.title.as_str()
        ],
    )
    .await?;
    Ok(())
}

async fn write_lesson(
    conn: &libsql::Connection,
    curriculum_id: &str,
    module_id: &str,
    position: u32,
    lesson: &AccountLesson,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lessons (account_id, curriculum_id, module_id, id, position, title, duration_minutes, completed, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        libsql::params![
            lesson.account_id.as_str(),
            curriculum_id,
            module_id,
            lesson.id.as_str(),
            i64::from(position),
            lesson.title.as_str(),
            i64::from(lesson.duration_minutes),
            i64::from(lesson.completed),
            opt_rfc3339(lesson.completed_at)
        ],
    )
    .await?;
    Ok(())
}

async fn delete_tree(
    conn: &libsql::Connection,
    account_id: &str,
    curriculum_id: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM lessons WHERE account_id = ?1 AND curriculum_id = ?2",
        [account_id, curriculum_id],
    )
    .await?;
    conn.execute(
        "DELETE FROM modules WHERE account_id = ?1 AND curriculum_id = ?2",
        [account_id, curriculum_id],
    )
    .await?;
    Ok(())
}

fn position(index: usize) -> Result<u32, DatabaseError> {
    u32::try_from(index).map_err(|_| DatabaseError::InvalidState(format!("position {index} overflows")))
}

impl LumService {
    /// All curricula of an account with their module/lesson trees, in insertion order.
    pub async fn list_curricula(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountCurriculum>, DatabaseError> {
        let conn = self.db().conn();

        let mut curricula = Vec::new();
        let mut rows = conn
            .query(
                "SELECT id, title, domain, created_at, origin_guest_id, origin_session_id, migrated_at
                 FROM curricula WHERE account_id = ?1 ORDER BY rowid",
                [account_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            curricula.push(row_to_curriculum(&row, account_id)?);
        }

        let mut lessons: HashMap<(String, String), Vec<AccountLesson>> = HashMap::new();
        let mut rows = conn
            .query(
                "SELECT curriculum_id, module_id, id, title, duration_minutes, completed, completed_at
                 FROM lessons WHERE account_id = ?1 ORDER BY curriculum_id, module_id, position",
                [account_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let key = (row.get::<String>(0)?, row.get::<String>(1)?);
            lessons
                .entry(key)
                .or_default()
                .push(row_to_lesson(&row, account_id)?);
        }

        let mut modules: HashMap<String, Vec<AccountModule>> = HashMap::new();
        let mut rows = conn
            .query(
                "SELECT curriculum_id, id, title FROM modules
                 WHERE account_id = ?1 ORDER BY curriculum_id, position",
                [account_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let curriculum_id = row.get::<String>(0)?;
            let id = row.get::<String>(1)?;
            let module_lessons = lessons
                .remove(&(curriculum_id.clone(), id.clone()))
                .unwrap_or_default();
            modules.entry(curriculum_id).or_default().push(AccountModule {
                id,
                account_id: account_id.to_string(),
                title: row.get::<String>(2)?,
                lessons: module_lessons,
            });
        }

        for curriculum in &mut curricula {
            curriculum.modules = modules.remove(&curriculum.id).unwrap_or_default();
        }
        Ok(curricula)
    }

    pub async fn get_curriculum(
        &self,
        account_id: &str,
        id: &str,
    ) -> Result<AccountCurriculum, DatabaseError> {
        self.list_curricula(account_id)
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "curriculum",
                id: id.to_string(),
            })
    }

    /// Insert a curriculum header only.
    pub async fn insert_curriculum(
        &self,
        curriculum: &AccountCurriculum,
    ) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        write_header(self.db().conn(), curriculum, false).await
    }

    pub async fn insert_module(
        &self,
        curriculum_id: &str,
        position: u32,
        module: &AccountModule,
    ) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        write_module(self.db().conn(), curriculum_id, position, module).await
    }

    pub async fn insert_lesson(
        &self,
        curriculum_id: &str,
        module_id: &str,
        position: u32,
        lesson: &AccountLesson,
    ) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        write_lesson(self.db().conn(), curriculum_id, module_id, position, lesson).await
    }

    /// Insert or replace a curriculum with its whole tree in one transaction.
    pub async fn upsert_curriculum(
        &self,
        curriculum: &AccountCurriculum,
    ) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        let tx = self.db().conn().transaction().await?;

        write_header(&tx, curriculum, true).await?;
        delete_tree(&tx, &curriculum.account_id, &curriculum.id).await?;
        for (m_idx, module) in curriculum.modules.iter().enumerate() {
            write_module(&tx, &curriculum.id, position(m_idx)?, module).await?;
            for (l_idx, lesson) in module.lessons.iter().enumerate() {
                write_lesson(&tx, &curriculum.id, &module.id, position(l_idx)?, lesson).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a curriculum and its tree.
    pub async fn remove_curriculum(&self, account_id: &str, id: &str) -> Result<(), DatabaseError> {
        let _guard = self.lock_writes().await;
        let tx = self.db().conn().transaction().await?;

        delete_tree(&tx, account_id, id).await?;
        let deleted = tx
            .execute(
                "DELETE FROM curricula WHERE account_id = ?1 AND id = ?2",
                [account_id, id],
            )
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "curriculum",
                id: id.to_string(),
            });
        }

        tx.commit().await?;
        Ok(())
    }

    /// Number of curricula in `account_id` that were migrated from `guest_id`.
    pub async fn count_curricula_from_guest(
        &self,
        account_id: &str,
        guest_id: &str,
    ) -> Result<u32, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT COUNT(*) FROM curricula WHERE account_id = ?1 AND origin_guest_id = ?2",
                [account_id, guest_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_u32(&row, 0)
    }
}
