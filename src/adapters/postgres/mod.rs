//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresEnrollmentStore` - Atomic enrollment + payment record commits
//! - `PostgresReconciliationLog` - Durable reconciliation entries
//!
//! Schema lives in `migrations/`.

mod enrollment_store;
mod reconciliation_log;

pub use enrollment_store::PostgresEnrollmentStore;
pub use reconciliation_log::PostgresReconciliationLog;
