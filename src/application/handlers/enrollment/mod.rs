//! Enrollment handlers.
//!
//! One `EnrollmentOrchestrator` sequences the components below for every
//! enrollment request:
//!
//! - `IntentServiceClient` - Creates or reuses the payment intent
//! - `ConfirmationHandler` - Drives user-paced confirmation on that intent
//! - `EnrollmentCommitter` - Atomic enrollment + payment record commit
//! - `NotificationHook` - Publishes events after the outcome is known
//! - `CacheInvalidationHandler` - Consumes those events to refresh caches

mod committer;
mod confirmation;
mod intent_client;
mod notification;
mod orchestrator;
mod session;

pub use committer::{CommitEnrollmentCommand, CommitOutcome, EnrollmentCommitter};
pub use confirmation::{
    CancelResult, ConfirmationHandler, ConfirmationResult, IntentConfirmation,
};
pub use intent_client::{IntentLease, IntentServiceClient, ObtainIntentCommand, ObtainedIntent};
pub use notification::{CacheInvalidationHandler, NotificationHook};
pub use orchestrator::{EnrollmentOrchestrator, OrchestratorConfig};
pub use session::{EnrollmentSession, SessionControl, SessionId};
