//! EnrollmentSession - The caller's side of one running enrollment.
//!
//! The orchestrator runs each request on its own task. The session carries
//! the status stream out of that task and payment details or a cancel
//! signal into it. Dropping every handle to a session that is waiting for
//! payment details counts as abandonment.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::error;
use uuid::Uuid;

use crate::domain::enrollment::{
    EnrollmentError, EnrollmentOutcome, EnrollmentStatus, FailureReason, PaymentDetails,
};
use crate::domain::foundation::ErrorCode;

/// Identifier of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Cloneable handle for feeding a session from elsewhere (e.g. an HTTP handler).
#[derive(Clone)]
pub struct SessionControl {
    id: SessionId,
    details_tx: mpsc::Sender<PaymentDetails>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl SessionControl {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Hands payment details to the session.
    pub async fn submit(&self, details: PaymentDetails) -> Result<(), EnrollmentError> {
        self.details_tx
            .send(details)
            .await
            .map_err(|_| EnrollmentError::invalid_state("finished", "submit payment details"))
    }

    /// Abandons the session. A no-op once it has finished.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.details_tx.is_closed()
    }
}

/// What the session task is waiting for next.
pub(super) enum SessionAction {
    Submit(PaymentDetails),
    Cancel,
}

/// Task side of a session.
pub(super) struct SessionChannels {
    status_tx: mpsc::Sender<EnrollmentStatus>,
    details_rx: mpsc::Receiver<PaymentDetails>,
    cancel_rx: watch::Receiver<bool>,
}

impl SessionChannels {
    /// Publishes a status. Statuses nobody listens for are dropped.
    pub(super) async fn emit(&self, status: EnrollmentStatus) {
        let _ = self.status_tx.send(status).await;
    }

    /// Waits for payment details or abandonment.
    pub(super) async fn next_action(&mut self) -> SessionAction {
        tokio::select! {
            biased;
            _ = canceled(&mut self.cancel_rx) => SessionAction::Cancel,
            details = self.details_rx.recv() => match details {
                Some(details) => SessionAction::Submit(details),
                None => SessionAction::Cancel,
            },
        }
    }

    /// Runs `work` unless the session is canceled first.
    pub(super) async fn unless_canceled<F: std::future::Future>(
        &mut self,
        work: F,
    ) -> Option<F::Output> {
        tokio::select! {
            out = work => Some(out),
            _ = canceled(&mut self.cancel_rx) => None,
        }
    }
}

/// Resolves once cancel is signaled. Never resolves if every control is gone.
async fn canceled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// One enrollment in progress.
pub struct EnrollmentSession {
    control: SessionControl,
    statuses: mpsc::Receiver<EnrollmentStatus>,
    task: JoinHandle<EnrollmentOutcome>,
}

impl EnrollmentSession {
    /// Creates the session and the channels its task drives.
    pub(super) fn channels(status_buffer: usize) -> (SessionParts, SessionChannels) {
        let (status_tx, statuses) = mpsc::channel(status_buffer.max(1));
        let (details_tx, details_rx) = mpsc::channel(4);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let control = SessionControl {
            id: SessionId::new(),
            details_tx,
            cancel_tx: Arc::new(cancel_tx),
        };
        (
            SessionParts { control, statuses },
            SessionChannels {
                status_tx,
                details_rx,
                cancel_rx,
            },
        )
    }

    pub(super) fn start(parts: SessionParts, task: JoinHandle<EnrollmentOutcome>) -> Self {
        Self {
            control: parts.control,
            statuses: parts.statuses,
            task,
        }
    }

    pub fn id(&self) -> SessionId {
        self.control.id
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub async fn submit(&self, details: PaymentDetails) -> Result<(), EnrollmentError> {
        self.control.submit(details).await
    }

    pub fn cancel(&self) {
        self.control.cancel()
    }

    /// Next status, or `None` after the terminal one.
    pub async fn next_status(&mut self) -> Option<EnrollmentStatus> {
        self.statuses.recv().await
    }

    /// Splits into a control handle and the status stream.
    ///
    /// The session keeps running while either half is alive.
    pub fn into_parts(
        self,
    ) -> (
        SessionControl,
        impl Stream<Item = EnrollmentStatus> + Send + 'static,
    ) {
        let statuses = stream::unfold(self.statuses, |mut rx| async move {
            rx.recv().await.map(|status| (status, rx))
        });
        (self.control, statuses)
    }

    /// Drains remaining statuses and returns the terminal outcome.
    pub async fn outcome(mut self) -> EnrollmentOutcome {
        while self.statuses.recv().await.is_some() {}

        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(session_id = %self.control.id, error = %err, "Enrollment task aborted");
                EnrollmentOutcome::Failed(FailureReason {
                    code: ErrorCode::InternalError,
                    message: "The enrollment could not be completed. Please try again."
                        .to_string(),
                    retryable: true,
                })
            }
        }
    }
}

/// Caller half of a session before its task is spawned.
pub(super) struct SessionParts {
    control: SessionControl,
    statuses: mpsc::Receiver<EnrollmentStatus>,
}

impl SessionParts {
    pub(super) fn id(&self) -> SessionId {
        self.control.id
    }
}
