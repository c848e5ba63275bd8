//! HTTP adapter for enrollment sessions.
//!
//! - `POST /api/enrollments` - Start joining a club or registering for an event
//! - `GET /api/enrollments/:id/events` - Server-sent status updates
//! - `POST /api/enrollments/:id/confirm` - Submit payment details
//! - `POST /api/enrollments/:id/cancel` - Abandon before payment completes

pub mod dto;
mod handlers;
mod routes;

pub use dto::*;
pub use handlers::{
    AuthenticatedUser, EnrollmentApiError, EnrollmentAppState, SessionRegistry,
};
pub use routes::enrollment_router;
