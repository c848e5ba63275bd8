//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `enrollment` - Enrollable items, payment intents, enrollments and the ledger

pub mod enrollment;
pub mod foundation;
