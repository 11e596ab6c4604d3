//! Checkpoints and compensating rollback.
//!
//! A checkpoint snapshots the target account before anything is written.
//! Rollback re-reads the account and diffs it against the snapshot, so it
//! undoes exactly what changed regardless of how far the migration got. Only
//! records the session owns are touched: ids listed in its [`PartialState`]
//! and records stamped with its session id. Other writers to the same account
//! keep their data. When the account cannot be read, the writes recorded in
//! the [`PartialState`] are compensated instead.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use lum_core::entities::{AccountDataset, Checkpoint, GuestDataset, MigrationOrigin};
use lum_core::ids::{PREFIX_CHECKPOINT, generate_id};
use lum_core::store::AccountStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MigrationError;

/// Ids of records the migration phase has written so far.
///
/// Updates of existing records are listed before the write is issued, so a
/// write abandoned mid-flight is still restored.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PartialState {
    pub curricula_written: Vec<String>,
    pub flashcards_written: Vec<String>,
    pub progress_written: bool,
    pub preferences_written: bool,
}

impl PartialState {
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.curricula_written.len()
            + self.flashcards_written.len()
            + usize::from(self.progress_written)
            + usize::from(self.preferences_written)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.write_count() == 0
    }

    fn wrote_curriculum(&self, id: &str) -> bool {
        self.curricula_written.iter().any(|c| c == id)
    }

    fn wrote_flashcard(&self, id: &str) -> bool {
        self.flashcards_written.iter().any(|f| f == id)
    }
}

/// Whether a stored record was stamped by `session_id`.
fn stamped_by(origin: Option<&MigrationOrigin>, session_id: &str) -> bool {
    origin.is_some_and(|o| o.session_id == session_id)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RollbackReport {
    pub checkpoint_id: String,
    pub success: bool,
    pub errors: Vec<String>,
    pub deleted: u32,
    pub restored: u32,
}

/// What to do with a failed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDecision {
    Rollback { checkpoint_id: String },
    Fail,
}

/// Decide between compensation and a plain failure.
///
/// Rollback happens only when the session still holds an open checkpoint and
/// the error kind may have left writes behind.
#[must_use]
pub fn handle_failure(
    session_id: &str,
    checkpoint: Option<&Checkpoint>,
    error: &MigrationError,
    partial: &PartialState,
) -> FailureDecision {
    let kind = error.kind();
    let decision = match checkpoint {
        Some(cp) if cp.session_id == session_id && cp.is_open() && kind.requires_rollback() => {
            FailureDecision::Rollback {
                checkpoint_id: cp.id.clone(),
            }
        }
        _ => FailureDecision::Fail,
    };
    debug!(
        session = %session_id,
        kind = %kind,
        writes = partial.write_count(),
        rollback = matches!(decision, FailureDecision::Rollback { .. }),
        "failure handled"
    );
    decision
}

#[derive(Default)]
struct Registry {
    live: HashMap<String, Checkpoint>,
    /// Guest and session ids whose checkpoint is being created.
    pending: HashSet<String>,
}

impl Registry {
    fn is_busy(&self, key: &str) -> bool {
        self.pending.contains(key)
            || self
                .live
                .values()
                .any(|cp| cp.is_open() && (cp.guest_id == key || cp.session_id == key))
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending slot for a checkpoint under construction. Dropping it without
/// `fill` frees the guest and session again.
struct Reservation<'a> {
    registry: &'a Mutex<Registry>,
    keys: [String; 2],
}

impl Reservation<'_> {
    fn fill(self, checkpoint: Checkpoint) {
        lock(self.registry)
            .live
            .insert(checkpoint.id.clone(), checkpoint);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut registry = lock(self.registry);
        for key in &self.keys {
            registry.pending.remove(key);
        }
    }
}

pub struct CheckpointManager<S> {
    store: Arc<S>,
    registry: Mutex<Registry>,
}

impl<S: AccountStore> CheckpointManager<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn reserve(&self, session_id: &str, guest_id: &str) -> Result<Reservation<'_>, MigrationError> {
        let mut registry = lock(&self.registry);
        if registry.is_busy(guest_id) {
            return Err(MigrationError::Concurrency(format!(
                "guest {guest_id} already has a migration in progress"
            )));
        }
        if registry.is_busy(session_id) {
            return Err(MigrationError::Concurrency(format!(
                "session {session_id} already holds a checkpoint"
            )));
        }
        registry.pending.insert(guest_id.to_string());
        registry.pending.insert(session_id.to_string());
        Ok(Reservation {
            registry: &self.registry,
            keys: [guest_id.to_string(), session_id.to_string()],
        })
    }

    /// Snapshot the account before the migration writes to it.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Concurrency` if the guest or session already
    /// holds an open checkpoint, or `Persistence` if the account cannot be read.
    pub async fn create_checkpoint(
        &self,
        session_id: &str,
        guest_id: &str,
        account_id: &str,
        guest: &GuestDataset,
    ) -> Result<Checkpoint, MigrationError> {
        let reservation = self.reserve(session_id, guest_id)?;
        let snapshot = self.store.read_account_data(account_id).await?;
        let checkpoint = Checkpoint {
            id: generate_id(PREFIX_CHECKPOINT)?,
            session_id: session_id.to_string(),
            guest_id: guest_id.to_string(),
            account_id: account_id.to_string(),
            snapshot,
            confirmed: false,
            rolled_back: false,
            created_at: Utc::now(),
        };
        info!(
            session = %session_id,
            checkpoint = %checkpoint.id,
            existing_curricula = checkpoint.snapshot.curricula.len(),
            existing_flashcards = checkpoint.snapshot.flashcards.len(),
            guest_curricula = guest.curricula.len(),
            guest_flashcards = guest.flashcards.len(),
            "checkpoint created"
        );
        reservation.fill(checkpoint.clone());
        Ok(checkpoint)
    }

    /// Close the rollback window of a successful migration.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointNotFound` for unknown ids and `Rollback` if the
    /// checkpoint was already rolled back.
    pub fn confirm_migration_success(&self, checkpoint_id: &str) -> Result<(), MigrationError> {
        let mut registry = lock(&self.registry);
        let cp = registry
            .live
            .get_mut(checkpoint_id)
            .ok_or_else(|| MigrationError::CheckpointNotFound(checkpoint_id.to_string()))?;
        if cp.rolled_back {
            return Err(MigrationError::Rollback(format!(
                "checkpoint {checkpoint_id} was already rolled back"
            )));
        }
        cp.confirmed = true;
        debug!(checkpoint = %checkpoint_id, "checkpoint confirmed");
        Ok(())
    }

    /// Drop a finished checkpoint from the live registry.
    pub fn release(&self, checkpoint_id: &str) -> Option<Checkpoint> {
        lock(&self.registry).live.remove(checkpoint_id)
    }

    #[must_use]
    pub fn checkpoint(&self, checkpoint_id: &str) -> Option<Checkpoint> {
        lock(&self.registry).live.get(checkpoint_id).cloned()
    }

    /// The open checkpoint held by `session_id`, if any.
    #[must_use]
    pub fn open_for_session(&self, session_id: &str) -> Option<Checkpoint> {
        lock(&self.registry)
            .live
            .values()
            .find(|cp| cp.is_open() && cp.session_id == session_id)
            .cloned()
    }

    #[must_use]
    pub fn open_for_guest(&self, guest_id: &str) -> Option<Checkpoint> {
        lock(&self.registry)
            .live
            .values()
            .find(|cp| cp.is_open() && cp.guest_id == guest_id)
            .cloned()
    }

    /// Restore what this session changed to its checkpoint snapshot.
    ///
    /// Records written by other sessions after the checkpoint are left alone.
    /// Every compensating action is attempted once; failures are collected in
    /// the report rather than aborting the rollback.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointNotFound`, `RollbackWindowClosed` once the
    /// checkpoint is confirmed, or `Rollback` if it was already rolled back.
    pub async fn execute_rollback(
        &self,
        checkpoint_id: &str,
        reason: &str,
        partial: &PartialState,
    ) -> Result<RollbackReport, MigrationError> {
        let checkpoint = {
            let mut registry = lock(&self.registry);
            let cp = registry
                .live
                .get_mut(checkpoint_id)
                .ok_or_else(|| MigrationError::CheckpointNotFound(checkpoint_id.to_string()))?;
            if cp.confirmed {
                return Err(MigrationError::RollbackWindowClosed(checkpoint_id.to_string()));
            }
            if cp.rolled_back {
                return Err(MigrationError::Rollback(format!(
                    "checkpoint {checkpoint_id} was already rolled back"
                )));
            }
            cp.rolled_back = true;
            cp.clone()
        };
        warn!(
            session = %checkpoint.session_id,
            checkpoint = %checkpoint_id,
            reason,
            "rolling back migration"
        );

        let mut report = RollbackReport {
            checkpoint_id: checkpoint_id.to_string(),
            success: false,
            errors: Vec::new(),
            deleted: 0,
            restored: 0,
        };
        match self.store.read_account_data(&checkpoint.account_id).await {
            Ok(current) => {
                self.undo_diff(&checkpoint, &current, partial, &mut report)
                    .await;
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("re-reading account {} failed: {e}", checkpoint.account_id));
                self.undo_recorded(&checkpoint.snapshot, partial, &mut report)
                    .await;
            }
        }
        report.success = report.errors.is_empty();

        info!(
            checkpoint = %checkpoint_id,
            success = report.success,
            deleted = report.deleted,
            restored = report.restored,
            errors = report.errors.len(),
            "rollback finished"
        );
        Ok(report)
    }

    async fn undo_diff(
        &self,
        checkpoint: &Checkpoint,
        current: &AccountDataset,
        partial: &PartialState,
        report: &mut RollbackReport,
    ) {
        let snapshot = &checkpoint.snapshot;
        let session = checkpoint.session_id.as_str();
        let account = snapshot.account_id.as_str();

        for c in &current.curricula {
            let ours = partial.wrote_curriculum(&c.id) || stamped_by(c.origin.as_ref(), session);
            if ours && snapshot.curriculum(&c.id).is_none() {
                let result = self.store.delete_curriculum(account, &c.id).await;
                tally(report, result, true, || format!("delete curriculum {}", c.id));
            }
        }
        for c in &snapshot.curricula {
            if partial.wrote_curriculum(&c.id) && current.curriculum(&c.id) != Some(c) {
                let result = self.store.replace_curriculum(c).await;
                tally(report, result, false, || format!("restore curriculum {}", c.id));
            }
        }

        for f in &current.flashcards {
            let ours = partial.wrote_flashcard(&f.id) || stamped_by(f.origin.as_ref(), session);
            if ours && snapshot.flashcard(&f.id).is_none() {
                let result = self.store.delete_flashcard(account, &f.id).await;
                tally(report, result, true, || format!("delete flashcard {}", f.id));
            }
        }
        for f in &snapshot.flashcards {
            if partial.wrote_flashcard(&f.id) && current.flashcard(&f.id) != Some(f) {
                let result = self.store.replace_flashcard(f).await;
                tally(report, result, false, || format!("restore flashcard {}", f.id));
            }
        }

        let progress_ours = partial.progress_written
            || current
                .progress
                .as_ref()
                .is_some_and(|p| stamped_by(p.origin.as_ref(), session));
        if progress_ours && snapshot.progress != current.progress {
            match &snapshot.progress {
                Some(p) => {
                    let result = self.store.save_progress(p).await;
                    tally(report, result, false, || "restore progress".to_string());
                }
                None => {
                    let result = self.store.delete_progress(account).await;
                    tally(report, result, true, || "delete progress".to_string());
                }
            }
        }
        let preferences_ours = partial.preferences_written
            || current
                .preferences
                .as_ref()
                .is_some_and(|p| stamped_by(p.origin.as_ref(), session));
        if preferences_ours && snapshot.preferences != current.preferences {
            match &snapshot.preferences {
                Some(p) => {
                    let result = self.store.save_preferences(p).await;
                    tally(report, result, false, || "restore preferences".to_string());
                }
                None => {
                    let result = self.store.delete_preferences(account).await;
                    tally(report, result, true, || "delete preferences".to_string());
                }
            }
        }
    }

    async fn undo_recorded(
        &self,
        snapshot: &AccountDataset,
        partial: &PartialState,
        report: &mut RollbackReport,
    ) {
        let account = snapshot.account_id.as_str();

        for id in &partial.curricula_written {
            if let Some(c) = snapshot.curriculum(id) {
                let result = self.store.replace_curriculum(c).await;
                tally(report, result, false, || format!("restore curriculum {id}"));
            } else {
                let result = self.store.delete_curriculum(account, id).await;
                tally(report, result, true, || format!("delete curriculum {id}"));
            }
        }
        for id in &partial.flashcards_written {
            if let Some(f) = snapshot.flashcard(id) {
                let result = self.store.replace_flashcard(f).await;
                tally(report, result, false, || format!("restore flashcard {id}"));
            } else {
                let result = self.store.delete_flashcard(account, id).await;
                tally(report, result, true, || format!("delete flashcard {id}"));
            }
        }
        if partial.progress_written {
            if let Some(p) = &snapshot.progress {
                let result = self.store.save_progress(p).await;
                tally(report, result, false, || "restore progress".to_string());
            } else {
                let result = self.store.delete_progress(account).await;
                tally(report, result, true, || "delete progress".to_string());
            }
        }
        if partial.preferences_written {
            if let Some(p) = &snapshot.preferences {
                let result = self.store.save_preferences(p).await;
                tally(report, result, false, || "restore preferences".to_string());
            } else {
                let result = self.store.delete_preferences(account).await;
                tally(report, result, true, || "delete preferences".to_string());
            }
        }
    }
}

fn tally<E: std::fmt::Display>(
    report: &mut RollbackReport,
    result: Result<(), E>,
    deletion: bool,
    action: impl FnOnce() -> String,
) {
    match result {
        Ok(()) if deletion => report.deleted += 1,
        Ok(()) => report.restored += 1,
        Err(e) => {
            let message = format!("{}: {e}", action());
            warn!(checkpoint = %report.checkpoint_id, error = %e, "compensating action failed");
            report.errors.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use lum_core::errors::StoreError;

    use super::*;

    fn checkpoint(session: &str) -> Checkpoint {
        Checkpoint {
            id: "chk-00000001".into(),
            session_id: session.into(),
            guest_id: "g1".into(),
            account_id: "a1".into(),
            snapshot: AccountDataset::empty("a1"),
            confirmed: false,
            rolled_back: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn failure_before_checkpoint_does_not_roll_back() {
        let err = MigrationError::Persistence(StoreError::Backend("down".into()));
        assert_eq!(
            handle_failure("mig-1", None, &err, &PartialState::default()),
            FailureDecision::Fail
        );
    }

    #[test]
    fn failure_after_checkpoint_rolls_back() {
        let cp = checkpoint("mig-1");
        let err = MigrationError::Persistence(StoreError::Backend("down".into()));
        assert_eq!(
            handle_failure("mig-1", Some(&cp), &err, &PartialState::default()),
            FailureDecision::Rollback {
                checkpoint_id: cp.id.clone()
            }
        );
    }

    #[test]
    fn validation_and_foreign_checkpoints_fail_plainly() {
        let cp = checkpoint("mig-1");
        let validation = MigrationError::Validation("bad".into());
        let timeout = MigrationError::Timeout(std::time::Duration::from_secs(1));
        let partial = PartialState::default();

        assert_eq!(
            handle_failure("mig-1", Some(&cp), &validation, &partial),
            FailureDecision::Fail
        );
        assert_eq!(
            handle_failure("mig-2", Some(&cp), &timeout, &partial),
            FailureDecision::Fail
        );

        let confirmed = Checkpoint {
            confirmed: true,
            ..cp
        };
        assert_eq!(
            handle_failure("mig-1", Some(&confirmed), &timeout, &partial),
            FailureDecision::Fail
        );
    }

    #[test]
    fn partial_state_counts_writes() {
        let partial = PartialState {
            curricula_written: vec!["c1".into()],
            flashcards_written: vec!["f1".into(), "f2".into()],
            progress_written: true,
            preferences_written: false,
        };
        assert_eq!(partial.write_count(), 4);
        assert!(PartialState::default().is_empty());
    }
}
