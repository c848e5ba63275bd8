//! EnrollmentOrchestrator - Runs one enrollment action end to end.
//!
//! ```text
//! begin_enrollment
//!   ├─ load item, resolve fee, verify asserted amount
//!   ├─ free ──────────────────────────────────────────────► commit
//!   └─ paid ─► obtain intent ─► AwaitingPaymentDetails ─► confirm ─► commit
//!                                  ▲                        │
//!                                  └──── PaymentDeclined ◄──┘
//! ```
//!
//! Each request runs sequentially on its own task; many run concurrently.
//! The orchestrator takes no locks of its own. Capacity and uniqueness are
//! enforced by the store during commit.
//!
//! Concurrent sessions with the same idempotency key share one intent.
//! Abandoning one of them only cancels the intent at the gateway when no
//! other session still holds it.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use crate::domain::enrollment::{
    EnrollableItem, EnrollmentError, EnrollmentOutcome, EnrollmentRequest, EnrollmentStatus,
    FeeResolver, IntentStatus, PaymentDetails, PaymentRef,
};
use crate::domain::foundation::Money;
use crate::ports::{ItemCatalog, ReconciliationKind};

use super::committer::{CommitEnrollmentCommand, EnrollmentCommitter};
use super::confirmation::{CancelResult, ConfirmationHandler, ConfirmationResult, IntentConfirmation};
use super::intent_client::{IntentLease, IntentServiceClient, ObtainIntentCommand, ObtainedIntent};
use super::notification::NotificationHook;
use super::session::{EnrollmentSession, SessionAction, SessionChannels};

/// Retry and session settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Automatic retries for infrastructure errors.
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Width of the time bucket behind free-path payment references.
    pub free_bucket_secs: u64,
    pub status_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff: Duration::from_millis(100),
            free_bucket_secs: 60,
            status_buffer: 32,
        }
    }
}

pub struct EnrollmentOrchestrator {
    catalog: Arc<dyn ItemCatalog>,
    fee_resolver: FeeResolver,
    intents: IntentServiceClient,
    confirmations: ConfirmationHandler,
    committer: EnrollmentCommitter,
    notifications: NotificationHook,
    config: OrchestratorConfig,
}

impl EnrollmentOrchestrator {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        intents: IntentServiceClient,
        confirmations: ConfirmationHandler,
        committer: EnrollmentCommitter,
        notifications: NotificationHook,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            catalog,
            fee_resolver: FeeResolver::new(),
            intents,
            confirmations,
            committer,
            notifications,
            config,
        }
    }

    /// Starts an enrollment and returns its session immediately.
    pub fn begin_enrollment(self: &Arc<Self>, request: EnrollmentRequest) -> EnrollmentSession {
        let (parts, mut channels) = EnrollmentSession::channels(self.config.status_buffer);
        let span = info_span!(
            "enrollment",
            session_id = %parts.id(),
            payer_id = %request.payer_id,
            item_id = %request.item_id,
            idempotency_key = %request.idempotency_key
        );

        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(
            async move {
                let outcome = orchestrator.run(&request, &mut channels).await;
                channels.emit(outcome.clone().into()).await;
                outcome
            }
            .instrument(span),
        );

        EnrollmentSession::start(parts, task)
    }

    async fn run(
        &self,
        request: &EnrollmentRequest,
        session: &mut SessionChannels,
    ) -> EnrollmentOutcome {
        let item = match self.load_item(request).await {
            Ok(item) => item,
            Err(err) => return self.failed(err),
        };

        let quote = self.fee_resolver.resolve(&item);
        if let Err(err) = self.fee_resolver.verify(&quote, request.asserted_amount) {
            return self.failed(err);
        }

        match self
            .with_retry("get_existing_enrollment", || {
                self.committer
                    .existing_enrollment(&request.payer_id, &item.id)
            })
            .await
        {
            Ok(Some(existing)) => {
                info!(enrollment_id = %existing.id, "Payer already enrolled");
                return EnrollmentOutcome::Enrolled {
                    enrollment_id: existing.id,
                    already_enrolled: true,
                };
            }
            Ok(None) => {}
            Err(err) => return self.failed(err),
        }

        if let Err(err) = self.check_not_full(&item).await {
            return self.failed(err);
        }

        if quote.is_free {
            session.emit(EnrollmentStatus::Processing).await;
            let payment_ref = PaymentRef::free(
                &request.payer_id,
                &item.id,
                request.requested_at,
                self.config.free_bucket_secs,
            );
            return self.commit(request, &item, quote.amount, payment_ref).await;
        }

        self.run_paid(request, &item, quote.amount, session).await
    }

    async fn run_paid(
        &self,
        request: &EnrollmentRequest,
        item: &EnrollableItem,
        amount: Money,
        session: &mut SessionChannels,
    ) -> EnrollmentOutcome {
        let ObtainedIntent {
            handle,
            reused,
            lease,
        } = match self
            .with_retry("create_intent", || {
                self.intents.handle(ObtainIntentCommand {
                    request: request.clone(),
                    amount,
                })
            })
            .await
        {
            Ok(obtained) => obtained,
            Err(err) => return self.failed(err),
        };

        let payment_ref = PaymentRef::Intent(handle.intent_id.clone());
        let mut confirmation = self.confirmations.start(handle);
        let mut lease = Some(lease);

        let already_charged = if reused {
            match self.intents.status(&confirmation.handle().intent_id).await {
                Ok(IntentStatus::Succeeded) => true,
                Ok(IntentStatus::Canceled) => {
                    info!(payment_ref = %payment_ref, "Reused intent was canceled earlier");
                    return self.canceled(request, item);
                }
                Ok(_) => false,
                Err(err) => {
                    warn!(error = %err, "Could not check reused intent; confirming again");
                    false
                }
            }
        } else {
            false
        };

        if already_charged {
            session.emit(EnrollmentStatus::Processing).await;
        } else if let ControlFlow::Break(outcome) = self
            .confirm_payment(request, item, &mut confirmation, &mut lease, session)
            .await
        {
            return outcome;
        }

        self.commit(request, item, amount, payment_ref).await
    }

    /// Runs the user-paced confirmation loop. `Continue` means money moved.
    async fn confirm_payment(
        &self,
        request: &EnrollmentRequest,
        item: &EnrollableItem,
        confirmation: &mut IntentConfirmation,
        lease: &mut Option<IntentLease>,
        session: &mut SessionChannels,
    ) -> ControlFlow<EnrollmentOutcome> {
        loop {
            session
                .emit(EnrollmentStatus::AwaitingPaymentDetails {
                    client_secret: confirmation.handle().client_secret.clone(),
                })
                .await;

            let details = match session.next_action().await {
                SessionAction::Submit(details) => details,
                SessionAction::Cancel => {
                    return self.abandon(request, item, confirmation, lease).await
                }
            };

            session.emit(EnrollmentStatus::Processing).await;

            let attempt = session
                .unless_canceled(self.confirm_with_retry(confirmation, &details))
                .await;

            match attempt {
                None => return self.abandon(request, item, confirmation, lease).await,
                Some(Ok(ConfirmationResult::Succeeded)) => return ControlFlow::Continue(()),
                Some(Ok(ConfirmationResult::Declined(reason))) => {
                    session.emit(EnrollmentStatus::PaymentDeclined(reason)).await;
                }
                Some(Err(EnrollmentError::Canceled)) => {
                    return ControlFlow::Break(self.canceled(request, item));
                }
                Some(Err(err)) => {
                    // Release the intent; the gateway may report the charge landed after all.
                    return match self.release_intent(confirmation, lease).await {
                        Ok(CancelResult::AlreadySucceeded) => ControlFlow::Continue(()),
                        _ => ControlFlow::Break(self.failed(err)),
                    };
                }
            }
        }
    }

    async fn confirm_with_retry(
        &self,
        confirmation: &mut IntentConfirmation,
        details: &PaymentDetails,
    ) -> Result<ConfirmationResult, EnrollmentError> {
        let mut attempt = 0;
        loop {
            match confirmation.confirm(details).await {
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "Retrying confirm_intent");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn abandon(
        &self,
        request: &EnrollmentRequest,
        item: &EnrollableItem,
        confirmation: &mut IntentConfirmation,
        lease: &mut Option<IntentLease>,
    ) -> ControlFlow<EnrollmentOutcome> {
        match self.release_intent(confirmation, lease).await {
            Ok(CancelResult::Canceled) => ControlFlow::Break(self.canceled(request, item)),
            Ok(CancelResult::AlreadySucceeded) => {
                warn!("Abandoned after the charge succeeded; committing");
                ControlFlow::Continue(())
            }
            Err(err) => ControlFlow::Break(self.failed(err)),
        }
    }

    /// Gives up this session's hold on the intent and cancels it at the
    /// gateway when no other session still holds it.
    async fn release_intent(
        &self,
        confirmation: &mut IntentConfirmation,
        lease: &mut Option<IntentLease>,
    ) -> Result<CancelResult, EnrollmentError> {
        let last_holder = lease.take().map_or(true, IntentLease::release);
        if !last_holder {
            info!(
                intent_id = %confirmation.handle().intent_id,
                "Intent still held by a concurrent session; leaving it open"
            );
            return Ok(CancelResult::Canceled);
        }
        confirmation.cancel().await
    }

    async fn commit(
        &self,
        request: &EnrollmentRequest,
        item: &EnrollableItem,
        amount: Money,
        payment_ref: PaymentRef,
    ) -> EnrollmentOutcome {
        let cmd = CommitEnrollmentCommand {
            payer_id: request.payer_id.clone(),
            item: item.clone(),
            amount,
            payment_ref: payment_ref.clone(),
        };

        match self
            .with_retry("commit", || self.committer.handle(cmd.clone()))
            .await
        {
            Ok(outcome) => {
                if outcome.newly_created {
                    self.notifications.enrollment_committed(
                        &outcome.enrollment,
                        amount,
                        &payment_ref,
                        &request.idempotency_key,
                    );
                }
                EnrollmentOutcome::Enrolled {
                    enrollment_id: outcome.enrollment.id,
                    already_enrolled: !outcome.newly_created,
                }
            }
            Err(EnrollmentError::CapacityExceeded { capacity, .. }) if !payment_ref.is_free() => {
                error!(
                    reconciliation = true,
                    payment_ref = %payment_ref,
                    amount = amount.cents(),
                    capacity,
                    "Charge captured but the event is full"
                );
                self.committer
                    .reconcile(
                        ReconciliationKind::CapacityExceededAfterCharge,
                        &cmd,
                        format!("event full at {} attendees", capacity),
                    )
                    .await;
                self.notifications.capacity_exceeded(
                    item,
                    &request.payer_id,
                    amount,
                    &payment_ref,
                    capacity,
                    &request.idempotency_key,
                );
                EnrollmentOutcome::PaidButCapacityExceeded { payment_ref }
            }
            Err(err) => {
                if !payment_ref.is_free() {
                    error!(
                        reconciliation = true,
                        payment_ref = %payment_ref,
                        amount = amount.cents(),
                        error = %err,
                        "Charge captured but the enrollment was not committed"
                    );
                    self.committer
                        .reconcile(
                            ReconciliationKind::CommitFailedAfterCharge,
                            &cmd,
                            err.to_string(),
                        )
                        .await;
                }
                self.failed(err)
            }
        }
    }

    async fn load_item(&self, request: &EnrollmentRequest) -> Result<EnrollableItem, EnrollmentError> {
        let item = self
            .with_retry("find_item", || async {
                self.catalog
                    .find_item(&request.item_id)
                    .await
                    .map_err(EnrollmentError::from)
            })
            .await?
            .ok_or_else(|| EnrollmentError::item_not_found(request.item_id))?;

        if item.kind != request.kind {
            return Err(EnrollmentError::validation(
                "kind",
                format!("item is a {}, not a {}", item.kind, request.kind),
            ));
        }
        Ok(item)
    }

    /// Fails early when the item is already full, before any money moves.
    ///
    /// Advisory only: the commit re-checks under the item lock.
    async fn check_not_full(&self, item: &EnrollableItem) -> Result<(), EnrollmentError> {
        let Some(capacity) = item.capacity() else {
            return Ok(());
        };
        match self.committer.enrollment_count(&item.id).await {
            Ok(count) if count >= capacity => Err(EnrollmentError::CapacityExceeded {
                item_id: item.id,
                capacity,
            }),
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, "Could not read enrollment count; deferring to commit");
                Ok(())
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, EnrollmentError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, EnrollmentError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "Retrying after infrastructure error");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                other => return other,
            }
        }
    }

    fn canceled(&self, request: &EnrollmentRequest, item: &EnrollableItem) -> EnrollmentOutcome {
        info!("Enrollment canceled by payer");
        self.notifications
            .enrollment_canceled(item, &request.payer_id, &request.idempotency_key);
        EnrollmentOutcome::Canceled
    }

    fn failed(&self, err: EnrollmentError) -> EnrollmentOutcome {
        warn!(code = %err.code(), error = %err, "Enrollment failed");
        EnrollmentOutcome::Failed(err.to_reason())
    }
}
