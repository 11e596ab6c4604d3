//! Migration saga.
//!
//! One `migrate` call runs the phases in order: initialization, validation,
//! checkpoint creation, transformation, conflict resolution, migration,
//! verification, and completion. A failure before the checkpoint exists ends
//! the session as `failed`; a failure after it triggers a compensating
//! rollback and ends it as `rolled_back`. Once the guest commit has landed the
//! run always completes. The caller always gets a session id back together
//! with the outcome.
//!
//! Runs for one guest are exclusive. Runs into one account take turns, so a
//! rollback never races another guest's writes to the same account.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lum_config::MigrationConfig;
use lum_core::entities::{
    AccountCurriculum, Checkpoint, CommitReceipt, ConflictRecord, ConflictStatistics,
    GuestDataset, IntegrityCheck, SessionSummary, ValidationReport,
};
use lum_core::enums::{
    ConflictStrategy, ErrorKind, MigrationPhase, OperationType, SessionStatus, ValidationStage,
};
use lum_core::errors::StoreError;
use lum_core::responses::{
    ConflictResolutionSummary, EligibilityResponse, EntityWriteCounts, MigrateRequest,
    MigrateResponse, MigrateSuccessResponse, MigrationFailureResponse, MigrationResults,
    ValidationFailureResponse, ValidationSummary,
};
use lum_core::store::{AccountStore, GuestProfileProvider};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::OwnedMutexGuard;

use crate::checkpoint::{CheckpointManager, FailureDecision, PartialState, handle_failure};
use crate::error::MigrationError;
use crate::logger::SessionLogger;
use crate::resolver::{ConflictResolutionResult, PlannedWrite, WriteAction, resolve};
use crate::transformer::{TransformedDataset, transform};
use crate::validator::{ValidationLimits, Validator, perform_data_integrity_check};

pub const ALREADY_MIGRATED: &str = "guest data already migrated";

/// Input of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub guest_id: String,
    pub account_id: String,
    pub guest_data: GuestDataset,
    /// Falls back to the configured default strategy.
    pub strategy: Option<ConflictStrategy>,
}

impl From<MigrateRequest> for MigrationRequest {
    fn from(request: MigrateRequest) -> Self {
        Self {
            guest_id: request.guest_id,
            account_id: request.account_id,
            guest_data: request.guest_data,
            strategy: request.conflict_resolution_strategy,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Phase the session was in when the error surfaced.
    pub phase: MigrationPhase,
}

/// Everything the caller learns about a finished migration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationOutcome {
    pub session_id: String,
    pub guest_id: String,
    pub account_id: String,
    pub status: SessionStatus,
    pub final_phase: MigrationPhase,
    pub strategy: ConflictStrategy,
    pub results: MigrationResults,
    pub statistics: ConflictStatistics,
    pub conflicts: Vec<ConflictRecord>,
    pub pre_validation: Option<ValidationReport>,
    pub post_transformation: Option<ValidationReport>,
    pub post_migration: Option<ValidationReport>,
    pub integrity: Option<IntegrityCheck>,
    pub rollback_performed: bool,
    pub rollback_errors: Vec<String>,
    pub error: Option<OutcomeError>,
    pub commit: Option<CommitReceipt>,
    pub summary: Option<SessionSummary>,
    pub completed_at: DateTime<Utc>,
}

impl MigrationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, SessionStatus::Completed)
    }

    /// Wire envelope for `POST /migrate`.
    #[must_use]
    pub fn to_response(&self) -> MigrateResponse {
        match &self.error {
            None => MigrateResponse::Success(MigrateSuccessResponse {
                success: true,
                session_id: self.session_id.clone(),
                migration_results: self.results.clone(),
                conflict_resolution: ConflictResolutionSummary {
                    strategy: self.strategy,
                    conflicts: self.statistics.total_conflicts,
                    resolutions: self.statistics.resolved_conflicts,
                },
                validation: ValidationSummary {
                    pre_validation: self.pre_validation.clone(),
                    post_validation: self.post_migration.clone(),
                    integrity_check: self.integrity.clone(),
                },
                completed_at: self.completed_at,
            }),
            Some(error) if error.kind == ErrorKind::Validation => {
                MigrateResponse::ValidationFailed(ValidationFailureResponse {
                    success: false,
                    error: error.message.clone(),
                    validation_report: self.pre_validation.clone(),
                    session_id: self.session_id.clone(),
                })
            }
            Some(error) => MigrateResponse::Failed(MigrationFailureResponse {
                success: false,
                error: error.message.clone(),
                error_kind: error.kind,
                session_id: self.session_id.clone(),
                rollback_performed: self.rollback_performed,
                rollback_errors: self.rollback_errors.clone(),
            }),
        }
    }
}

/// Mutable state of one invocation.
struct Run {
    session_id: String,
    guest_id: String,
    account_id: String,
    strategy: ConflictStrategy,
    guest: GuestDataset,
    phase: MigrationPhase,
    checkpoint: Option<Checkpoint>,
    partial: PartialState,
    results: MigrationResults,
    statistics: ConflictStatistics,
    conflicts: Vec<ConflictRecord>,
    pre_validation: Option<ValidationReport>,
    post_transformation: Option<ValidationReport>,
    post_migration: Option<ValidationReport>,
    integrity: Option<IntegrityCheck>,
    commit: Option<CommitReceipt>,
}

impl Run {
    fn new(session_id: String, request: MigrationRequest, strategy: ConflictStrategy) -> Self {
        Self {
            session_id,
            guest_id: request.guest_id,
            account_id: request.account_id,
            strategy,
            guest: request.guest_data,
            phase: MigrationPhase::Initialization,
            checkpoint: None,
            partial: PartialState::default(),
            results: MigrationResults::default(),
            statistics: ConflictStatistics::new(strategy),
            conflicts: Vec::new(),
            pre_validation: None,
            post_transformation: None,
            post_migration: None,
            integrity: None,
            commit: None,
        }
    }

    fn outcome(
        self,
        status: SessionStatus,
        error: Option<OutcomeError>,
        rollback: (bool, Vec<String>),
        summary: Option<SessionSummary>,
    ) -> MigrationOutcome {
        MigrationOutcome {
            final_phase: summary.as_ref().map_or(self.phase, |s| s.final_phase),
            session_id: self.session_id,
            guest_id: self.guest_id,
            account_id: self.account_id,
            status,
            strategy: self.strategy,
            results: self.results,
            statistics: self.statistics,
            conflicts: self.conflicts,
            pre_validation: self.pre_validation,
            post_transformation: self.post_transformation,
            post_migration: self.post_migration,
            integrity: self.integrity,
            rollback_performed: rollback.0,
            rollback_errors: rollback.1,
            error,
            commit: self.commit,
            summary,
            completed_at: Utc::now(),
        }
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Pre-migration report for a request refused before its data is looked at.
fn refused(errors: Vec<String>, checks_run: u32) -> ValidationReport {
    ValidationReport {
        stage: ValidationStage::PreMigration,
        valid: false,
        checks_passed: checks_run.saturating_sub(position(errors.len())),
        errors,
        warnings: Vec::new(),
        integrity_score: 0,
        checks_run,
    }
}

fn record_write(counts: &mut EntityWriteCounts, id: &str, result: &Result<(), StoreError>) {
    match result {
        Ok(()) => counts.success += 1,
        Err(e) => {
            counts.failed += 1;
            counts.errors.push(format!("{id}: {e}"));
        }
    }
}

/// Marks a guest as in flight until dropped.
struct InFlight<'a> {
    registry: &'a Mutex<HashSet<String>>,
    guest_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.guest_id);
    }
}

type AccountLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// An account's migration turn, held until dropped.
struct AccountTurn<'a> {
    registry: &'a AccountLocks,
    account_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.account_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.account_id);
        }
    }
}

pub struct MigrationEngine<S, G> {
    store: Arc<S>,
    guests: Arc<G>,
    validator: Validator,
    checkpoints: CheckpointManager<S>,
    logger: Arc<SessionLogger>,
    default_strategy: ConflictStrategy,
    deadline: Option<Duration>,
    in_flight: Mutex<HashSet<String>>,
    accounts: AccountLocks,
}

impl<S: AccountStore, G: GuestProfileProvider> MigrationEngine<S, G> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        guests: Arc<G>,
        logger: Arc<SessionLogger>,
        config: &MigrationConfig,
    ) -> Self {
        Self {
            checkpoints: CheckpointManager::new(Arc::clone(&store)),
            store,
            guests,
            validator: Validator::new(ValidationLimits::from(config)),
            logger,
            default_strategy: config.default_strategy,
            deadline: config.deadline(),
            in_flight: Mutex::new(HashSet::new()),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointManager<S> {
        &self.checkpoints
    }

    #[must_use]
    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim_guest(&self, guest_id: &str) -> Option<InFlight<'_>> {
        self.in_flight().insert(guest_id.to_string()).then(|| InFlight {
            registry: &self.in_flight,
            guest_id: guest_id.to_string(),
        })
    }

    /// Wait until no other run targets `account_id`.
    async fn account_turn(&self, account_id: &str) -> AccountTurn<'_> {
        let lock = {
            let mut locks = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(account_id.to_string()).or_default())
        };
        if lock.try_lock().is_err() {
            tracing::debug!(account = account_id, "waiting for another migration into the account");
        }
        AccountTurn {
            registry: &self.accounts,
            account_id: account_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Migrate guest data into an account under the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns an error only when no session could be opened. Every other
    /// failure is reported through the returned outcome.
    pub async fn migrate(&self, request: MigrationRequest) -> Result<MigrationOutcome, MigrationError> {
        self.execute(request, self.deadline).await
    }

    /// Like [`migrate`](Self::migrate) with an explicit deadline. When it
    /// elapses the running phase is abandoned and, if a checkpoint exists,
    /// the account is rolled back. The deadline covers every phase up to the
    /// guest commit; the commit itself is never cut short.
    ///
    /// # Errors
    ///
    /// Returns an error only when no session could be opened.
    pub async fn migrate_with_deadline(
        &self,
        request: MigrationRequest,
        deadline: Duration,
    ) -> Result<MigrationOutcome, MigrationError> {
        self.execute(request, Some(deadline)).await
    }

    /// Migrate the dataset the guest profile provider holds for `guest_id`.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the profile cannot be loaded and `Validation`
    /// if nothing is stored for the guest.
    pub async fn migrate_stored_guest(
        &self,
        guest_id: &str,
        account_id: &str,
        strategy: Option<ConflictStrategy>,
    ) -> Result<MigrationOutcome, MigrationError> {
        let guest_data = self
            .guests
            .load_guest_dataset(guest_id)
            .await?
            .ok_or_else(|| MigrationError::Validation(format!("no stored data for guest {guest_id}")))?;
        self.migrate(MigrationRequest {
            guest_id: guest_id.to_string(),
            account_id: account_id.to_string(),
            guest_data,
            strategy,
        })
        .await
    }

    /// Whether the guest still has content worth migrating.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if usage stats cannot be read.
    pub async fn check_eligibility(&self, guest_id: &str) -> Result<EligibilityResponse, MigrationError> {
        let stats = self.guests.guest_usage_stats(guest_id).await?;
        Ok(EligibilityResponse::from_stats(stats))
    }

    async fn execute(
        &self,
        request: MigrationRequest,
        deadline: Option<Duration>,
    ) -> Result<MigrationOutcome, MigrationError> {
        let strategy = request.strategy.unwrap_or(self.default_strategy);
        let session_id = self
            .logger
            .initialize_session(&request.guest_id, &request.account_id)?;
        let mut run = Run::new(session_id, request, strategy);
        tracing::info!(
            session = %run.session_id,
            guest = %run.guest_id,
            account = %run.account_id,
            strategy = %strategy,
            "migration started"
        );

        let Some(_slot) = self.claim_guest(&run.guest_id) else {
            let error = MigrationError::Concurrency(format!(
                "guest {} already has a migration in progress",
                run.guest_id
            ));
            return Ok(self.finish_failure(run, error).await);
        };

        let _turn = self.account_turn(&run.account_id).await;

        let prepared = match deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_phases(&mut run))
                .await
                .unwrap_or(Err(MigrationError::Timeout(limit))),
            None => self.run_phases(&mut run).await,
        };
        if let Err(error) = prepared {
            return Ok(self.finish_failure(run, error).await);
        }
        if let Err(error) = self.commit(&mut run).await {
            return Ok(self.finish_failure(run, error).await);
        }
        self.completion(&mut run);
        Ok(self.finish_success(run))
    }

    fn advance(&self, run: &mut Run, phase: MigrationPhase) -> Result<(), MigrationError> {
        self.logger.update_migration_phase(&run.session_id, phase)?;
        run.phase = phase;
        Ok(())
    }

    /// Close a logged operation with the outcome of `result` and pass it on.
    fn settle<T>(
        &self,
        run: &Run,
        operation_id: &str,
        result: Result<T, MigrationError>,
        describe: impl FnOnce(&T) -> Value,
    ) -> Result<T, MigrationError> {
        match result {
            Ok(value) => {
                self.logger
                    .log_operation_success(&run.session_id, operation_id, describe(&value))?;
                Ok(value)
            }
            Err(error) => {
                if let Err(e) = self.logger.log_operation_failure(
                    &run.session_id,
                    operation_id,
                    &error.to_string(),
                    json!({ "kind": error.kind() }),
                ) {
                    tracing::warn!(session = %run.session_id, error = %e, "could not log operation failure");
                }
                Err(error)
            }
        }
    }

    async fn run_phases(&self, run: &mut Run) -> Result<(), MigrationError> {
        self.initialization(run).await?;
        self.validation(run)?;
        self.checkpoint_creation(run).await?;
        let transformed = self.transformation(run)?;
        let resolution = self.conflict_resolution(run, &transformed)?;
        self.migration(run, &resolution).await?;
        self.verification(run, &resolution).await
    }

    async fn initialization(&self, run: &mut Run) -> Result<(), MigrationError> {
        let blank: Vec<String> = [("guestId", &run.guest_id), ("accountId", &run.account_id)]
            .into_iter()
            .filter(|(_, id)| id.trim().is_empty())
            .map(|(field, _)| format!("{field} must not be empty"))
            .collect();
        if !blank.is_empty() {
            let message = blank.join("; ");
            run.pre_validation = Some(refused(blank, 2));
            return Err(MigrationError::Validation(message));
        }
        if self.guests.is_guest_consumed(&run.guest_id).await? {
            run.pre_validation = Some(refused(vec![ALREADY_MIGRATED.to_string()], 1));
            return Err(MigrationError::Validation(ALREADY_MIGRATED.to_string()));
        }
        self.logger.log_info(
            &run.session_id,
            "guest data received",
            json!({
                "curricula": run.guest.curricula.len(),
                "flashcards": run.guest.flashcards.len(),
                "strategy": run.strategy,
            }),
        )
    }

    fn validation(&self, run: &mut Run) -> Result<(), MigrationError> {
        self.advance(run, MigrationPhase::Validation)?;
        let op = self.logger.log_operation_start(
            &run.session_id,
            OperationType::ValidateGuestData,
            Value::Null,
        )?;
        let report = self.validator.validate_guest_data(&run.guest);
        for warning in &report.warnings {
            self.logger.log_warning(&run.session_id, warning, Value::Null)?;
        }
        run.pre_validation = Some(report.clone());
        let checked = if report.valid {
            Ok(report)
        } else {
            Err(MigrationError::Validation(format!(
                "guest data failed validation: {}",
                report.errors.join("; ")
            )))
        };
        self.settle(run, &op, checked, |r| {
            json!({ "integrity_score": r.integrity_score, "checks_run": r.checks_run })
        })?;
        Ok(())
    }

    async fn checkpoint_creation(&self, run: &mut Run) -> Result<(), MigrationError> {
        self.advance(run, MigrationPhase::CheckpointCreation)?;
        let op = self.logger.log_operation_start(
            &run.session_id,
            OperationType::CreateCheckpoint,
            json!({ "account_id": run.account_id }),
        )?;
        let created = self
            .checkpoints
            .create_checkpoint(&run.session_id, &run.guest_id, &run.account_id, &run.guest)
            .await;
        let checkpoint = self.settle(run, &op, created, |cp| json!({ "checkpoint_id": cp.id }))?;
        run.checkpoint = Some(checkpoint);
        Ok(())
    }

    fn transformation(&self, run: &mut Run) -> Result<TransformedDataset, MigrationError> {
        self.advance(run, MigrationPhase::Transformation)?;
        let op = self
            .logger
            .log_operation_start(&run.session_id, OperationType::Transform, Value::Null)?;
        let transformed = transform(
            &run.guest,
            &run.guest_id,
            &run.account_id,
            &run.session_id,
            Utc::now(),
        );
        let transformed = self.settle(run, &op, transformed, |t| json!(t.summary))?;

        let op = self.logger.log_operation_start(
            &run.session_id,
            OperationType::ValidateTransformed,
            Value::Null,
        )?;
        let report = self
            .validator
            .validate_transformed_data(&transformed, &run.account_id);
        run.post_transformation = Some(report.clone());
        let checked = if report.valid {
            Ok(report)
        } else {
            Err(MigrationError::Transformation(format!(
                "transformed data failed validation: {}",
                report.errors.join("; ")
            )))
        };
        self.settle(run, &op, checked, |r| json!({ "integrity_score": r.integrity_score }))?;
        Ok(transformed)
    }

    fn conflict_resolution(
        &self,
        run: &mut Run,
        transformed: &TransformedDataset,
    ) -> Result<ConflictResolutionResult, MigrationError> {
        self.advance(run, MigrationPhase::ConflictResolution)?;
        let existing = run
            .checkpoint
            .as_ref()
            .map(|cp| &cp.snapshot)
            .ok_or_else(|| MigrationError::CheckpointNotFound(run.session_id.clone()))?;
        let op = self.logger.log_operation_start(
            &run.session_id,
            OperationType::ResolveConflicts,
            json!({ "strategy": run.strategy }),
        )?;
        let resolved = resolve(transformed, existing, run.strategy);
        let resolution = self.settle(run, &op, resolved, |r| {
            json!({ "statistics": r.statistics, "writes": r.plan.len() })
        })?;
        for conflict in &resolution.conflicts {
            self.logger.log_info(
                &run.session_id,
                &format!("{} conflict on '{}'", conflict.entity_type, conflict.natural_key),
                json!(conflict),
            )?;
        }
        run.statistics = resolution.statistics;
        run.conflicts.clone_from(&resolution.conflicts);
        Ok(resolution)
    }

    async fn insert_curriculum(
        &self,
        curriculum: &AccountCurriculum,
        partial: &mut PartialState,
    ) -> Result<(), StoreError> {
        self.store.create_curriculum(curriculum).await?;
        // The header alone already needs compensation.
        partial.curricula_written.push(curriculum.id.clone());
        for (m, module) in curriculum.modules.iter().enumerate() {
            self.store
                .create_module(&curriculum.id, position(m), module)
                .await?;
            for (l, lesson) in module.lessons.iter().enumerate() {
                self.store
                    .create_lesson(&curriculum.id, &module.id, position(l), lesson)
                    .await?;
            }
        }
        Ok(())
    }

    async fn apply(&self, run: &mut Run, write: &PlannedWrite) -> Result<(), MigrationError> {
        let op_type = match write {
            PlannedWrite::Curriculum { .. } => OperationType::WriteCurriculum,
            PlannedWrite::Flashcard { .. } => OperationType::WriteFlashcard,
            PlannedWrite::Progress { .. } => OperationType::WriteProgress,
            PlannedWrite::Preferences { .. } => OperationType::WritePreferences,
        };
        let op = self.logger.log_operation_start(
            &run.session_id,
            op_type,
            json!({ "id": write.id(), "action": write.action() }),
        )?;

        let result = match write {
            // Updates are listed before they are issued and retracted if
            // they fail, so an update cut off by the deadline is restored.
            PlannedWrite::Curriculum { action, record } => {
                let result = match action {
                    WriteAction::Insert => self.insert_curriculum(record, &mut run.partial).await,
                    WriteAction::Update => {
                        run.partial.curricula_written.push(record.id.clone());
                        let result = self.store.replace_curriculum(record).await;
                        if result.is_err() {
                            run.partial.curricula_written.pop();
                        }
                        result
                    }
                };
                record_write(&mut run.results.plans, &record.id, &result);
                result
            }
            PlannedWrite::Flashcard { action, record } => {
                let result = match action {
                    WriteAction::Insert => {
                        let result = self.store.create_flashcard(record).await;
                        if result.is_ok() {
                            run.partial.flashcards_written.push(record.id.clone());
                        }
                        result
                    }
                    WriteAction::Update => {
                        run.partial.flashcards_written.push(record.id.clone());
                        let result = self.store.replace_flashcard(record).await;
                        if result.is_err() {
                            run.partial.flashcards_written.pop();
                        }
                        result
                    }
                };
                record_write(&mut run.results.flashcards, &record.id, &result);
                result
            }
            PlannedWrite::Progress { record, .. } => {
                let before = std::mem::replace(&mut run.partial.progress_written, true);
                let result = self.store.save_progress(record).await;
                if result.is_err() {
                    run.partial.progress_written = before;
                }
                record_write(&mut run.results.sessions, "progress", &result);
                result
            }
            PlannedWrite::Preferences { record, .. } => {
                let before = std::mem::replace(&mut run.partial.preferences_written, true);
                let result = self.store.save_preferences(record).await;
                if result.is_err() {
                    run.partial.preferences_written = before;
                }
                record_write(&mut run.results.sessions, "preferences", &result);
                result
            }
        };

        // A single failed write is absorbed; verification decides its fate.
        match result {
            Ok(()) => self
                .logger
                .log_operation_success(&run.session_id, &op, Value::Null),
            Err(e) => self.logger.log_operation_failure(
                &run.session_id,
                &op,
                &e.to_string(),
                json!({ "id": write.id() }),
            ),
        }
    }

    async fn migration(
        &self,
        run: &mut Run,
        resolution: &ConflictResolutionResult,
    ) -> Result<(), MigrationError> {
        self.advance(run, MigrationPhase::Migration)?;
        for write in &resolution.plan {
            self.apply(run, write).await?;
        }
        let failed = run.results.plans.failed + run.results.flashcards.failed + run.results.sessions.failed;
        if failed > 0 {
            self.logger.log_warning(
                &run.session_id,
                &format!("{failed} writes failed"),
                json!(run.results),
            )?;
        }
        Ok(())
    }

    async fn verification(
        &self,
        run: &mut Run,
        resolution: &ConflictResolutionResult,
    ) -> Result<(), MigrationError> {
        self.advance(run, MigrationPhase::Verification)?;

        let op = self
            .logger
            .log_operation_start(&run.session_id, OperationType::VerifyResults, Value::Null)?;
        let report = self
            .validator
            .validate_migration_results(
                &run.guest,
                &run.guest_id,
                &run.account_id,
                self.store.as_ref(),
                resolution,
            )
            .await;
        let report = self.settle(run, &op, report, |r| {
            json!({ "valid": r.valid, "integrity_score": r.integrity_score })
        })?;
        run.post_migration = Some(report.clone());

        let op = self
            .logger
            .log_operation_start(&run.session_id, OperationType::IntegrityCheck, Value::Null)?;
        let stored = self
            .store
            .read_account_data(&run.account_id)
            .await
            .map_err(MigrationError::from);
        let stored = self.settle(run, &op, stored, |s| {
            json!({ "curricula": s.curricula.len(), "flashcards": s.flashcards.len() })
        })?;
        let integrity = perform_data_integrity_check(&run.session_id, &resolution.final_dataset, &stored);
        run.integrity = Some(integrity.clone());

        if !report.valid {
            return Err(MigrationError::Integrity(report.errors.join("; ")));
        }
        if !integrity.is_clean() {
            return Err(MigrationError::Integrity(format!(
                "{} stored records differ from the resolved dataset (score {})",
                integrity.issues.len(),
                integrity.integrity_score
            )));
        }
        Ok(())
    }

    /// The guest commit, the last write of verification.
    ///
    /// A failed commit leaves nothing behind and is rolled back like any
    /// other failure. A successful one is final: logging problems after it
    /// are only warned about.
    async fn commit(&self, run: &mut Run) -> Result<(), MigrationError> {
        let op = self.logger.log_operation_start(
            &run.session_id,
            OperationType::CommitGuest,
            json!({ "guest_id": run.guest_id }),
        )?;
        let committed = self
            .store
            .commit_guest_to_account(&run.guest_id, &run.account_id)
            .await
            .map_err(MigrationError::from);
        let receipt = match committed {
            Ok(receipt) => receipt,
            Err(error) => return self.settle(run, &op, Err(error), |_: &()| Value::Null),
        };
        if let Err(e) = self
            .logger
            .log_operation_success(&run.session_id, &op, json!(receipt))
        {
            tracing::warn!(session = %run.session_id, error = %e, "could not log guest commit");
        }
        run.commit = Some(receipt);
        Ok(())
    }

    /// Close the rollback window. Runs after the guest commit, so nothing
    /// here may fail the run.
    fn completion(&self, run: &mut Run) {
        if let Err(e) = self.advance(run, MigrationPhase::Completion) {
            tracing::warn!(session = %run.session_id, error = %e, "could not enter completion");
        }
        if let Some(cp) = &run.checkpoint {
            if let Err(e) = self.checkpoints.confirm_migration_success(&cp.id) {
                tracing::warn!(session = %run.session_id, error = %e, "could not confirm checkpoint");
            }
            self.checkpoints.release(&cp.id);
        }
    }

    fn summary_json(run: &Run) -> Value {
        json!({
            "strategy": run.strategy,
            "results": run.results,
            "conflicts": run.statistics,
            "commit_id": run.commit.as_ref().map(|c| c.commit_id.clone()),
        })
    }

    fn finish_success(&self, run: Run) -> MigrationOutcome {
        let summary = match self.logger.complete_session(
            &run.session_id,
            SessionStatus::Completed,
            Self::summary_json(&run),
        ) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(session = %run.session_id, error = %e, "could not close session");
                None
            }
        };
        tracing::info!(session = %run.session_id, "migration completed");
        run.outcome(SessionStatus::Completed, None, (false, Vec::new()), summary)
    }

    async fn finish_failure(&self, run: Run, error: MigrationError) -> MigrationOutcome {
        let sid = run.session_id.clone();
        let kind = error.kind();
        let message = error.to_string();
        tracing::error!(session = %sid, phase = %run.phase, kind = %kind, error = %message, "migration failed");
        if let Err(e) = self.logger.log_error(
            &sid,
            &format!("migration failed in phase {}: {message}", run.phase),
            json!({ "kind": kind }),
        ) {
            tracing::warn!(session = %sid, error = %e, "could not log failure");
        }
        match self.logger.abandon_open_operations(&sid, &message) {
            Ok(0) => {}
            Ok(abandoned) => tracing::debug!(session = %sid, abandoned, "open operations closed"),
            Err(e) => tracing::warn!(session = %sid, error = %e, "could not close open operations"),
        }

        let checkpoint = run
            .checkpoint
            .as_ref()
            .and_then(|cp| self.checkpoints.checkpoint(&cp.id))
            .or_else(|| self.checkpoints.open_for_session(&sid));

        let (status, rollback) = match handle_failure(&sid, checkpoint.as_ref(), &error, &run.partial) {
            FailureDecision::Rollback { checkpoint_id } => {
                self.roll_back(&run, &checkpoint_id, &message).await
            }
            FailureDecision::Fail => {
                if let Some(cp) = &checkpoint {
                    self.checkpoints.release(&cp.id);
                }
                (SessionStatus::Failed, (false, Vec::new()))
            }
        };

        let mut summary_json = Self::summary_json(&run);
        summary_json["error"] = json!({ "kind": kind, "message": message });
        summary_json["rollback_performed"] = json!(rollback.0);
        let summary = match self.logger.complete_session(&sid, status, summary_json) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(session = %sid, error = %e, "could not close session");
                None
            }
        };
        let phase = run.phase;
        run.outcome(
            status,
            Some(OutcomeError {
                kind,
                message,
                phase,
            }),
            rollback,
            summary,
        )
    }

    async fn roll_back(
        &self,
        run: &Run,
        checkpoint_id: &str,
        reason: &str,
    ) -> (SessionStatus, (bool, Vec<String>)) {
        let sid = run.session_id.as_str();
        let op = self
            .logger
            .log_operation_start(sid, OperationType::Rollback, json!({ "checkpoint_id": checkpoint_id }))
            .ok();
        let report = self
            .checkpoints
            .execute_rollback(checkpoint_id, reason, &run.partial)
            .await;
        self.checkpoints.release(checkpoint_id);

        let (status, rollback, logged) = match report {
            Ok(report) => {
                let logged = op.as_deref().map(|op| {
                    if report.success {
                        self.logger.log_operation_success(sid, op, json!(report))
                    } else {
                        self.logger.log_operation_failure(
                            sid,
                            op,
                            &report.errors.join("; "),
                            json!(report),
                        )
                    }
                });
                (SessionStatus::RolledBack, (true, report.errors), logged)
            }
            Err(e) => {
                let logged = op
                    .as_deref()
                    .map(|op| self.logger.log_operation_failure(sid, op, &e.to_string(), Value::Null));
                (SessionStatus::Failed, (false, vec![e.to_string()]), logged)
            }
        };
        if let Some(Err(e)) = logged {
            tracing::warn!(session = %sid, error = %e, "could not log rollback");
        }
        (status, rollback)
    }
}
