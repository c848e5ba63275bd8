//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod enrollment;

pub use enrollment::{
    CacheInvalidationHandler, CommitEnrollmentCommand, CommitOutcome, ConfirmationHandler,
    EnrollmentCommitter, EnrollmentOrchestrator, EnrollmentSession, IntentServiceClient,
    NotificationHook, OrchestratorConfig, SessionControl, SessionId,
};
