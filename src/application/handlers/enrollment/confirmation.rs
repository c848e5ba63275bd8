//! ConfirmationHandler - Drives one payment intent through confirmation.
//!
//! Each paid session owns an `IntentConfirmation` that tracks the local
//! `ConfirmationState` and reconciles it with what the gateway reports.
//! A decline is not an error: the user may submit new details for the same
//! intent. Only `Succeeded` lets the session move on to commit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::enrollment::{
    ConfirmationState, EnrollmentError, FailureReason, IntentHandle, IntentStatus,
    PaymentDetails, PaymentIntent,
};
use crate::domain::foundation::StateMachine;
use crate::ports::PaymentGateway;

const DEFAULT_DECLINE_REASON: &str = "card declined";

/// Result of one confirmation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationResult {
    Succeeded,
    /// The gateway declined; the same intent accepts another attempt.
    Declined(FailureReason),
}

/// Result of abandoning an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    Canceled,
    /// The charge landed before the cancel reached the gateway.
    AlreadySucceeded,
}

/// Creates confirmations bound to a gateway.
pub struct ConfirmationHandler {
    gateway: Arc<dyn PaymentGateway>,
    call_timeout: Duration,
    processing_poll: Duration,
    processing_attempts: u32,
}

impl ConfirmationHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, call_timeout: Duration) -> Self {
        Self {
            gateway,
            call_timeout,
            processing_poll: Duration::from_millis(500),
            processing_attempts: 6,
        }
    }

    /// How long to keep polling an intent the gateway reports as processing.
    pub fn with_processing_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.processing_poll = interval;
        self.processing_attempts = attempts;
        self
    }

    pub fn start(&self, handle: IntentHandle) -> IntentConfirmation {
        IntentConfirmation {
            gateway: self.gateway.clone(),
            handle,
            state: ConfirmationState::Created,
            call_timeout: self.call_timeout,
            processing_poll: self.processing_poll,
            processing_attempts: self.processing_attempts,
        }
    }
}

/// Confirmation progress for one intent.
pub struct IntentConfirmation {
    gateway: Arc<dyn PaymentGateway>,
    handle: IntentHandle,
    state: ConfirmationState,
    call_timeout: Duration,
    processing_poll: Duration,
    processing_attempts: u32,
}

impl IntentConfirmation {
    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    pub fn handle(&self) -> &IntentHandle {
        &self.handle
    }

    /// Submits payment details and waits for the gateway's verdict.
    pub async fn confirm(
        &mut self,
        details: &PaymentDetails,
    ) -> Result<ConfirmationResult, EnrollmentError> {
        self.transition(ConfirmationState::Confirming)?;

        let call = tokio::time::timeout(
            self.call_timeout,
            self.gateway.confirm_intent(&self.handle, details),
        )
        .await;

        match call {
            Ok(Ok(intent)) => self.apply(intent).await,
            Ok(Err(err)) => self.recover(err.into()).await,
            Err(_) => {
                self.recover(EnrollmentError::gateway_unavailable(
                    "confirm_intent timed out",
                ))
                .await
            }
        }
    }

    /// Abandons the intent. Never touches the enrollment store.
    pub async fn cancel(&mut self) -> Result<CancelResult, EnrollmentError> {
        if self.state == ConfirmationState::Canceled {
            return Ok(CancelResult::Canceled);
        }
        if self.state == ConfirmationState::Succeeded {
            return Ok(CancelResult::AlreadySucceeded);
        }

        let call = tokio::time::timeout(
            self.call_timeout,
            self.gateway.cancel_intent(&self.handle.intent_id),
        )
        .await;

        match call {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                if self.fetch_status().await == Some(IntentStatus::Succeeded) {
                    warn!(
                        intent_id = %self.handle.intent_id,
                        "Cancel arrived after the charge succeeded"
                    );
                    // The gateway is authoritative; the client may have confirmed directly.
                    self.state = ConfirmationState::Succeeded;
                    return Ok(CancelResult::AlreadySucceeded);
                }
                warn!(
                    intent_id = %self.handle.intent_id,
                    error = %err.message,
                    "Gateway cancel failed; intent will expire unconfirmed"
                );
            }
            Err(_) => {
                warn!(
                    intent_id = %self.handle.intent_id,
                    "Gateway cancel timed out; intent will expire unconfirmed"
                );
            }
        }

        self.transition(ConfirmationState::Canceled)?;
        info!(intent_id = %self.handle.intent_id, "Payment intent canceled");
        Ok(CancelResult::Canceled)
    }

    async fn apply(&mut self, intent: PaymentIntent) -> Result<ConfirmationResult, EnrollmentError> {
        let mut intent = intent;
        let mut polls = 0;
        while intent.status == IntentStatus::Processing && polls < self.processing_attempts {
            tokio::time::sleep(self.processing_poll).await;
            polls += 1;
            match self.retrieve().await {
                Ok(latest) => intent = latest,
                Err(err) => return self.fail(err),
            }
        }

        match intent.status {
            IntentStatus::Succeeded => {
                self.transition(ConfirmationState::Succeeded)?;
                info!(intent_id = %self.handle.intent_id, "Payment confirmed");
                Ok(ConfirmationResult::Succeeded)
            }
            IntentStatus::Failed => {
                let reason = intent
                    .last_error
                    .unwrap_or_else(|| DEFAULT_DECLINE_REASON.to_string());
                self.decline(EnrollmentError::payment_failed(reason, None))
            }
            IntentStatus::RequiresConfirmation => self.decline(EnrollmentError::payment_failed(
                "the payment requires additional action",
                None,
            )),
            IntentStatus::Canceled => {
                self.transition(ConfirmationState::Canceled)?;
                Err(EnrollmentError::Canceled)
            }
            IntentStatus::Processing => self.fail(EnrollmentError::gateway_unavailable(
                "payment is still processing",
            )),
        }
    }

    /// The confirm call errored. Declines are reported as such; anything
    /// else may have reached the gateway, so its view decides.
    async fn recover(&mut self, err: EnrollmentError) -> Result<ConfirmationResult, EnrollmentError> {
        if matches!(err, EnrollmentError::PaymentFailed { .. }) {
            return self.decline(err);
        }

        match self.retrieve().await {
            Ok(intent)
                if matches!(
                    intent.status,
                    IntentStatus::Succeeded | IntentStatus::Canceled | IntentStatus::Failed
                ) =>
            {
                self.apply(intent).await
            }
            _ => self.fail(err),
        }
    }

    fn decline(&mut self, err: EnrollmentError) -> Result<ConfirmationResult, EnrollmentError> {
        self.transition(ConfirmationState::Failed)?;
        info!(
            intent_id = %self.handle.intent_id,
            reason = %err.message(),
            "Payment declined"
        );
        Ok(ConfirmationResult::Declined(err.to_reason()))
    }

    fn fail(&mut self, err: EnrollmentError) -> Result<ConfirmationResult, EnrollmentError> {
        // Failed keeps the intent open for another attempt.
        self.transition(ConfirmationState::Failed)?;
        Err(err)
    }

    async fn retrieve(&self) -> Result<PaymentIntent, EnrollmentError> {
        tokio::time::timeout(
            self.call_timeout,
            self.gateway.retrieve_intent(&self.handle.intent_id),
        )
        .await
        .map_err(|_| EnrollmentError::gateway_unavailable("retrieve_intent timed out"))?
        .map_err(EnrollmentError::from)
    }

    async fn fetch_status(&self) -> Option<IntentStatus> {
        self.retrieve().await.ok().map(|intent| intent.status)
    }

    fn transition(&mut self, target: ConfirmationState) -> Result<(), EnrollmentError> {
        let current = self.state;
        self.state = current
            .transition_to(target)
            .map_err(|_| EnrollmentError::invalid_state(current.as_str(), target.as_str()))?;
        Ok(())
    }
}
