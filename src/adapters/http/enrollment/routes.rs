//! Route configuration for enrollment endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel_enrollment, confirm_payment, start_enrollment, stream_events, EnrollmentAppState,
};

/// Creates the enrollment router.
///
/// Routes:
/// - `POST /api/enrollments` - Start a session, returns its id
/// - `GET /api/enrollments/:id/events` - Status stream (SSE, one subscriber)
/// - `POST /api/enrollments/:id/confirm` - Submit payment details
/// - `POST /api/enrollments/:id/cancel` - Abandon the session
pub fn enrollment_router() -> Router<EnrollmentAppState> {
    Router::new()
        .route("/api/enrollments", post(start_enrollment))
        .route("/api/enrollments/:id/events", get(stream_events))
        .route("/api/enrollments/:id/confirm", post(confirm_payment))
        .route("/api/enrollments/:id/cancel", post(cancel_enrollment))
}
