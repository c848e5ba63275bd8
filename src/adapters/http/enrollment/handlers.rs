//! HTTP handlers for enrollment endpoints.
//!
//! A session outlives the request that started it, so the handlers keep
//! running sessions in a registry keyed by `SessionId`. The status stream can
//! be taken once; payment details and cancels go through the cloneable
//! `SessionControl`.
//!
//! A session is abandoned when its event stream disconnects before a
//! terminal status, or when nobody opens the stream within the claim timeout.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::application::handlers::enrollment::{
    EnrollmentOrchestrator, EnrollmentSession, SessionControl, SessionId,
};
use crate::domain::enrollment::{EnrollmentError, EnrollmentRequest, EnrollmentStatus};
use crate::domain::foundation::{IdempotencyKey, UserId};

use super::dto::{
    ConfirmPaymentRequest, ErrorResponse, StartEnrollmentRequest, StartEnrollmentResponse,
};

const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(60);

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

struct SessionEntry {
    payer_id: UserId,
    control: SessionControl,
    statuses: Option<BoxStream<'static, EnrollmentStatus>>,
}

/// Sessions started over HTTP and not yet finished.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    claim_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_claim_timeout(DEFAULT_CLAIM_TIMEOUT)
    }

    /// Sessions whose stream is not opened within `claim_timeout` are abandoned.
    pub fn with_claim_timeout(claim_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            claim_timeout,
        }
    }

    // Never held across an await.
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(self: &Arc<Self>, payer_id: UserId, session: EnrollmentSession) -> SessionId {
        let id = session.id();
        let (control, statuses) = session.into_parts();
        {
            let mut sessions = self.sessions();
            sessions.retain(|_, entry| !entry.control.is_finished());
            sessions.insert(
                id,
                SessionEntry {
                    payer_id,
                    control,
                    statuses: Some(statuses.boxed()),
                },
            );
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registry.claim_timeout).await;
            registry.expire_unclaimed(id);
        });

        id
    }

    fn control(&self, id: SessionId, payer_id: &UserId) -> Result<SessionControl, EnrollmentApiError> {
        self.sessions()
            .get(&id)
            .filter(|entry| &entry.payer_id == payer_id)
            .map(|entry| entry.control.clone())
            .ok_or(EnrollmentApiError::SessionNotFound(id))
    }

    fn take_statuses(
        self: &Arc<Self>,
        id: SessionId,
        payer_id: &UserId,
    ) -> Result<StatusStream, EnrollmentApiError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(&id)
            .filter(|entry| &entry.payer_id == payer_id)
            .ok_or(EnrollmentApiError::SessionNotFound(id))?;
        let statuses = entry
            .statuses
            .take()
            .ok_or(EnrollmentApiError::StreamTaken(id))?;

        Ok(StatusStream {
            id,
            statuses,
            control: entry.control.clone(),
            registry: Arc::clone(self),
            finished: false,
        })
    }

    /// Drops the session and abandons it if it is still running.
    fn abandon(&self, id: SessionId) {
        if let Some(entry) = self.sessions().remove(&id) {
            entry.control.cancel();
        }
    }

    fn expire_unclaimed(&self, id: SessionId) {
        let mut sessions = self.sessions();
        let unclaimed = sessions
            .get(&id)
            .map_or(false, |entry| entry.statuses.is_some());
        if !unclaimed {
            return;
        }
        if let Some(entry) = sessions.remove(&id) {
            if !entry.control.is_finished() {
                info!(session_id = %id, "Event stream never opened; abandoning session");
            }
            entry.control.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status stream of one session. Dropped before a terminal status, it
/// abandons the session.
struct StatusStream {
    id: SessionId,
    statuses: BoxStream<'static, EnrollmentStatus>,
    control: SessionControl,
    registry: Arc<SessionRegistry>,
    finished: bool,
}

impl Stream for StatusStream {
    type Item = EnrollmentStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.statuses.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(Some(status)) if status.is_terminal() => self.finished = true,
            Poll::Ready(None) => self.finished = true,
            _ => {}
        }
        polled
    }
}

impl Drop for StatusStream {
    fn drop(&mut self) {
        if self.finished || self.control.is_finished() {
            return;
        }
        info!(session_id = %self.id, "Event stream disconnected; abandoning session");
        self.control.cancel();
        self.registry.abandon(self.id);
    }
}

/// Shared state for enrollment routes.
#[derive(Clone)]
pub struct EnrollmentAppState {
    pub orchestrator: Arc<EnrollmentOrchestrator>,
    pub sessions: Arc<SessionRegistry>,
}

impl EnrollmentAppState {
    pub fn new(orchestrator: Arc<EnrollmentOrchestrator>) -> Self {
        Self::with_registry(orchestrator, SessionRegistry::new())
    }

    pub fn with_registry(orchestrator: Arc<EnrollmentOrchestrator>, sessions: SessionRegistry) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(sessions),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Payer identified by the `X-User-Id` header.
///
/// Authentication happens upstream; this adapter trusts the header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("UNAUTHORIZED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/enrollments - Start an enrollment session
pub async fn start_enrollment(
    State(state): State<EnrollmentAppState>,
    user: AuthenticatedUser,
    Json(body): Json<StartEnrollmentRequest>,
) -> Result<impl IntoResponse, EnrollmentApiError> {
    let key = IdempotencyKey::new(body.idempotency_key)
        .map_err(|e| EnrollmentError::validation("idempotency_key", e.to_string()))?;

    let mut request = EnrollmentRequest::new(user.user_id.clone(), body.item_id, body.kind, key);
    if let Some(amount) = body.amount {
        request = request.with_asserted_amount(amount);
    }

    let session = state.orchestrator.begin_enrollment(request);
    let session_id = state.sessions.insert(user.user_id, session);

    let response = StartEnrollmentResponse {
        session_id: session_id.to_string(),
        events_url: format!("/api/enrollments/{}/events", session_id),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/enrollments/:id/events - Stream status updates as server-sent events
pub async fn stream_events(
    State(state): State<EnrollmentAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, EnrollmentApiError> {
    let id = parse_session_id(&id)?;
    let statuses = state.sessions.take_statuses(id, &user.user_id)?;

    debug!(session_id = %id, "Streaming enrollment statuses");

    let events = statuses.map(|status| Ok(status_event(&status)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/enrollments/:id/confirm - Submit payment details
pub async fn confirm_payment(
    State(state): State<EnrollmentAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, EnrollmentApiError> {
    let id = parse_session_id(&id)?;
    let control = state.sessions.control(id, &user.user_id)?;

    control.submit(body.into()).await?;

    Ok(StatusCode::ACCEPTED)
}

/// POST /api/enrollments/:id/cancel - Abandon the session
pub async fn cancel_enrollment(
    State(state): State<EnrollmentAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EnrollmentApiError> {
    let id = parse_session_id(&id)?;
    let control = state.sessions.control(id, &user.user_id)?;

    control.cancel();

    Ok(StatusCode::ACCEPTED)
}

fn parse_session_id(raw: &str) -> Result<SessionId, EnrollmentApiError> {
    raw.parse()
        .map_err(|_| EnrollmentError::validation("session_id", "Invalid session ID format").into())
}

fn status_event(status: &EnrollmentStatus) -> Event {
    let event = Event::default().event(status.name());
    match serde_json::to_string(status) {
        Ok(data) => event.data(data),
        Err(err) => {
            warn!(error = %err, "Failed to serialize enrollment status");
            event.data("{}")
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper that converts enrollment errors to HTTP responses.
#[derive(Debug)]
pub enum EnrollmentApiError {
    Enrollment(EnrollmentError),
    SessionNotFound(SessionId),
    StreamTaken(SessionId),
}

impl From<EnrollmentError> for EnrollmentApiError {
    fn from(err: EnrollmentError) -> Self {
        Self::Enrollment(err)
    }
}

impl IntoResponse for EnrollmentApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            EnrollmentApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("SESSION_NOT_FOUND", format!("Session not found: {}", id)),
            ),
            EnrollmentApiError::StreamTaken(id) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "STREAM_ALREADY_TAKEN",
                    format!("Session {} already has a subscriber", id),
                ),
            ),
            EnrollmentApiError::Enrollment(err) => {
                let status = match &err {
                    EnrollmentError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                    EnrollmentError::InvalidPaymentRequest { .. }
                    | EnrollmentError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
                    EnrollmentError::GatewayUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    EnrollmentError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
                    EnrollmentError::Canceled
                    | EnrollmentError::DuplicateEnrollment { .. }
                    | EnrollmentError::CapacityExceeded { .. }
                    | EnrollmentError::InvalidState { .. } => StatusCode::CONFLICT,
                    EnrollmentError::PersistenceFailure { .. }
                    | EnrollmentError::AmbiguousCommit { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let body = ErrorResponse::new(err.code().to_string(), err.message())
                    .retryable(err.is_retryable());
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_session_id_is_bad_request() {
        let err = parse_session_id("not-a-uuid").unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gateway_outage_maps_to_service_unavailable() {
        let err = EnrollmentApiError::from(EnrollmentError::gateway_unavailable("down"));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn finished_session_maps_to_conflict() {
        let err = EnrollmentApiError::from(EnrollmentError::invalid_state(
            "finished",
            "submit payment details",
        ));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_session_maps_to_not_found() {
        let err = EnrollmentApiError::SessionNotFound(SessionId::new());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
