//! In-memory adapters for development and tests.
//!
//! - `InMemoryEnrollmentStore` - Per-item locked ledgers
//! - `InMemoryIntentRegistry` - Idempotency key to intent mapping
//! - `InMemoryItemCatalog` - Club and event lookup
//! - `InMemoryReconciliationLog` - Reconciliation entries
//! - `InMemoryEnrollmentCache` - Seat counts and payer views

mod enrollment_cache;
mod enrollment_store;
mod intent_registry;
mod item_catalog;
mod reconciliation_log;

pub use enrollment_cache::InMemoryEnrollmentCache;
pub use enrollment_store::InMemoryEnrollmentStore;
pub use intent_registry::InMemoryIntentRegistry;
pub use item_catalog::InMemoryItemCatalog;
pub use reconciliation_log::InMemoryReconciliationLog;
