//! Service layer over `LumDb`.
//!
//! All repo methods are implemented as `impl LumService` in `repos/`.
//! Multi-statement writes run inside a libSQL transaction and are serialized
//! through `write_lock`, since every call shares one connection.

use tokio::sync::{Mutex, MutexGuard};

use crate::LumDb;
use crate::error::DatabaseError;

pub struct LumService {
    db: LumDb,
    write_lock: Mutex<()>,
}

impl LumService {
    /// Open a local database and wrap it.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        if db_path != ":memory:"
            && let Some(parent) = std::path::Path::new(db_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Other(e.into()))?;
        }
        let db = LumDb::open_local(db_path).await?;
        Ok(Self::from_db(db))
    }

    #[must_use]
    pub fn from_db(db: LumDb) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn db(&self) -> &LumDb {
        &self.db
    }

    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
