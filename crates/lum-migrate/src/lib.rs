//! # lum-migrate
//!
//! Moves a guest's learning content into a permanent account.
//!
//! The store offers no multi-entity transaction, so a migration runs as a
//! saga: the account is snapshotted into a [`checkpoint`] before the first
//! write, every write is a single-entity unit, and any failure after the
//! snapshot triggers compensating rollback back to it.
//!
//! Components, leaf first:
//! - [`validator`]: structural and business checks, integrity scoring
//! - [`transformer`]: guest schema to account schema
//! - [`resolver`]: deterministic conflict resolution per strategy
//! - [`checkpoint`]: snapshots, rollback, failure policy
//! - [`logger`]: per-session structured log and metrics
//! - [`orchestrator`]: the phased [`MigrationEngine`]

pub mod checkpoint;
pub mod error;
pub mod logger;
pub mod orchestrator;
pub mod resolver;
pub mod transformer;
pub mod validator;

pub use error::MigrationError;
pub use logger::SessionLogger;
pub use orchestrator::{MigrationEngine, MigrationOutcome, MigrationRequest};
