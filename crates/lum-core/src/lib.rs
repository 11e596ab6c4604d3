//! # lum-core
//!
//! Core types, ID generation, store contracts, and error types for Lumen.
//!
//! This crate provides the foundational types shared across all Lumen crates:
//! - Guest-side and account-side entity structs (curricula, flashcards, progress, preferences)
//! - Phase and status enums with state machine transitions
//! - ID prefix constants and generation helpers
//! - Natural-key normalization for conflict detection
//! - Store traits the migration engine consumes
//! - Cross-cutting error types
//! - Wire envelopes for the migration entrypoint

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod keys;
pub mod responses;
pub mod store;
