//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Transaction Ports
//!
//! - `PaymentGateway` - Two-phase intent/confirm payment service
//! - `EnrollmentStore` - Atomic enrollment + payment record commit
//! - `ItemCatalog` - Club and event lookup
//! - `IntentRegistry` - Idempotency key to intent mapping
//! - `ReconciliationLog` - Outcomes that need manual compensation
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events
//! - `EventSubscriber` - Port for subscribing to domain events
//! - `EventHandler` - Handler that processes incoming events
//! - `EnrollmentCache` - Read-side caches invalidated after commit

mod enrollment_cache;
mod enrollment_store;
mod event_publisher;
mod event_subscriber;
mod intent_registry;
mod item_catalog;
mod payment_gateway;
mod reconciliation_log;

pub use enrollment_cache::EnrollmentCache;
pub use enrollment_store::{CommitResult, EnrollmentStore, NewEnrollment};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use intent_registry::IntentRegistry;
pub use item_catalog::ItemCatalog;
pub use payment_gateway::{CreateIntentRequest, GatewayError, GatewayErrorCode, PaymentGateway};
pub use reconciliation_log::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};
