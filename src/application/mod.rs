//! Application layer - Commands and Handlers.
//!
//! This layer sequences domain operations and coordinates between ports.
//! It owns the retry, cancel and timeout policy for an enrollment.

pub mod handlers;

pub use handlers::{
    CacheInvalidationHandler, ConfirmationHandler, EnrollmentCommitter, EnrollmentOrchestrator,
    EnrollmentSession, IntentServiceClient, NotificationHook, OrchestratorConfig,
    SessionControl, SessionId,
};
