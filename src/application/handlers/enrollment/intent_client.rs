//! IntentServiceClient - Obtains a payment intent for one enrollment request.
//!
//! Intents are keyed by the request's idempotency key twice over: locally in
//! the `IntentRegistry`, and at the gateway via the `Idempotency-Key` header.
//! A double-submitted request therefore reuses the first intent instead of
//! creating a second one.
//!
//! Every session that obtains an intent holds an `IntentLease` on it. Only
//! the last holder may cancel a shared intent at the gateway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::enrollment::{
    EnrollmentError, EnrollmentRequest, IntentHandle, IntentId, IntentStatus,
};
use crate::domain::foundation::Money;
use crate::ports::{CreateIntentRequest, IntentRegistry, PaymentGateway};

/// Command to obtain an intent for a paid enrollment.
#[derive(Debug, Clone)]
pub struct ObtainIntentCommand {
    pub request: EnrollmentRequest,
    /// Resolved fee; the only amount ever sent to the gateway.
    pub amount: Money,
}

/// Intent handle plus whether it came from an earlier attempt.
#[derive(Debug)]
pub struct ObtainedIntent {
    pub handle: IntentHandle,
    pub reused: bool,
    pub lease: IntentLease,
}

/// Number of live sessions per intent.
#[derive(Debug, Default)]
struct IntentHolders {
    counts: Mutex<HashMap<IntentId, usize>>,
}

impl IntentHolders {
    fn counts(&self) -> MutexGuard<'_, HashMap<IntentId, usize>> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn join(self: &Arc<Self>, intent_id: &IntentId) -> IntentLease {
        *self.counts().entry(intent_id.clone()).or_insert(0) += 1;
        IntentLease {
            holders: Arc::clone(self),
            intent_id: intent_id.clone(),
            held: true,
        }
    }

    /// Returns true when nobody holds the intent any more.
    fn leave(&self, intent_id: &IntentId) -> bool {
        let mut counts = self.counts();
        match counts.get_mut(intent_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => {
                counts.remove(intent_id);
                true
            }
        }
    }

    fn holders(&self, intent_id: &IntentId) -> usize {
        self.counts().get(intent_id).copied().unwrap_or(0)
    }
}

/// One session's hold on an intent. Dropping it releases the hold.
#[derive(Debug)]
pub struct IntentLease {
    holders: Arc<IntentHolders>,
    intent_id: IntentId,
    held: bool,
}

impl IntentLease {
    pub fn intent_id(&self) -> &IntentId {
        &self.intent_id
    }

    /// Gives up the hold. Returns true when this was the last holder, which
    /// makes the caller responsible for canceling the intent.
    pub fn release(mut self) -> bool {
        self.held = false;
        self.holders.leave(&self.intent_id)
    }
}

impl Drop for IntentLease {
    fn drop(&mut self) {
        if self.held {
            self.holders.leave(&self.intent_id);
        }
    }
}

pub struct IntentServiceClient {
    gateway: Arc<dyn PaymentGateway>,
    registry: Arc<dyn IntentRegistry>,
    holders: Arc<IntentHolders>,
    currency: String,
    call_timeout: Duration,
}

impl IntentServiceClient {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        registry: Arc<dyn IntentRegistry>,
        currency: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            registry,
            holders: Arc::new(IntentHolders::default()),
            currency: currency.into(),
            call_timeout,
        }
    }

    pub async fn handle(&self, cmd: ObtainIntentCommand) -> Result<ObtainedIntent, EnrollmentError> {
        // Zero amounts belong on the free path; reaching here is a caller bug.
        if cmd.amount.is_zero() {
            return Err(EnrollmentError::invalid_payment_request(
                "cannot create a payment intent for a free item",
            ));
        }

        let key = &cmd.request.idempotency_key;

        if let Some(handle) = self.registry.find(key).await? {
            debug!(
                intent_id = %handle.intent_id,
                idempotency_key = %key,
                "Reusing payment intent"
            );
            return Ok(ObtainedIntent {
                lease: self.holders.join(&handle.intent_id),
                handle,
                reused: true,
            });
        }

        let request = CreateIntentRequest {
            amount: cmd.amount,
            currency: self.currency.clone(),
            metadata: Self::metadata(&cmd.request),
            idempotency_key: key.clone(),
        };

        let intent = tokio::time::timeout(self.call_timeout, self.gateway.create_intent(request))
            .await
            .map_err(|_| {
                EnrollmentError::gateway_unavailable(format!(
                    "create_intent timed out after {:?}",
                    self.call_timeout
                ))
            })??;

        // A concurrent attempt with the same key may have recorded first.
        let handle = self.registry.record(key, intent.handle()).await?;

        info!(
            intent_id = %handle.intent_id,
            payer_id = %cmd.request.payer_id,
            item_id = %cmd.request.item_id,
            amount = cmd.amount.cents(),
            "Payment intent created"
        );

        Ok(ObtainedIntent {
            lease: self.holders.join(&handle.intent_id),
            handle,
            reused: false,
        })
    }

    /// Sessions currently holding `intent_id`.
    pub fn holders(&self, intent_id: &IntentId) -> usize {
        self.holders.holders(intent_id)
    }

    /// Current gateway status of an intent.
    pub async fn status(&self, intent_id: &IntentId) -> Result<IntentStatus, EnrollmentError> {
        let intent = tokio::time::timeout(self.call_timeout, self.gateway.retrieve_intent(intent_id))
            .await
            .map_err(|_| EnrollmentError::gateway_unavailable("retrieve_intent timed out"))??;
        Ok(intent.status)
    }

    fn metadata(request: &EnrollmentRequest) -> HashMap<String, String> {
        HashMap::from([
            ("payer_id".to_string(), request.payer_id.to_string()),
            ("item_id".to_string(), request.item_id.to_string()),
            ("item_kind".to_string(), request.kind.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::MockPaymentGateway;
    use crate::adapters::memory::InMemoryIntentRegistry;
    use crate::domain::enrollment::ItemKind;
    use crate::domain::foundation::{IdempotencyKey, ItemId, UserId};
    use crate::ports::GatewayError;

    fn request(key: &str) -> EnrollmentRequest {
        EnrollmentRequest::new(
            UserId::new("member-1").unwrap(),
            ItemId::new(),
            ItemKind::Event,
            IdempotencyKey::new(key).unwrap(),
        )
    }

    fn client(gateway: &MockPaymentGateway) -> IntentServiceClient {
        IntentServiceClient::new(
            Arc::new(gateway.clone()),
            Arc::new(InMemoryIntentRegistry::new()),
            "usd",
            Duration::from_secs(5),
        )
    }

    fn ten_dollars() -> Money {
        Money::from_cents(1000).unwrap()
    }

    #[tokio::test]
    async fn creates_intent_for_resolved_amount() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);

        let obtained = client
            .handle(ObtainIntentCommand {
                request: request("key-1"),
                amount: ten_dollars(),
            })
            .await
            .unwrap();

        assert!(!obtained.reused);
        assert_eq!(gateway.created_amounts(), vec![ten_dollars()]);
    }

    #[tokio::test]
    async fn same_key_reuses_intent_without_calling_gateway() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);
        let cmd = ObtainIntentCommand {
            request: request("key-1"),
            amount: ten_dollars(),
        };

        let first = client.handle(cmd.clone()).await.unwrap();
        let second = client.handle(cmd).await.unwrap();

        assert!(second.reused);
        assert_eq!(first.handle, second.handle);
        assert_eq!(gateway.call_count("create_intent"), 1);
    }

    #[tokio::test]
    async fn shared_intent_is_released_by_last_holder_only() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);
        let cmd = ObtainIntentCommand {
            request: request("key-1"),
            amount: ten_dollars(),
        };

        let first = client.handle(cmd.clone()).await.unwrap();
        let second = client.handle(cmd).await.unwrap();
        let intent_id = first.handle.intent_id.clone();
        assert_eq!(client.holders(&intent_id), 2);

        assert!(!first.lease.release());
        assert_eq!(client.holders(&intent_id), 1);
        assert!(second.lease.release());
        assert_eq!(client.holders(&intent_id), 0);
    }

    #[tokio::test]
    async fn dropped_lease_releases_its_hold() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);
        let cmd = ObtainIntentCommand {
            request: request("key-1"),
            amount: ten_dollars(),
        };

        let first = client.handle(cmd.clone()).await.unwrap();
        let intent_id = first.handle.intent_id.clone();
        drop(first);
        let second = client.handle(cmd).await.unwrap();

        assert_eq!(client.holders(&intent_id), 1);
        assert!(second.lease.release());
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_gateway() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);

        let err = client
            .handle(ObtainIntentCommand {
                request: request("key-1"),
                amount: Money::ZERO,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollmentError::InvalidPaymentRequest { .. }));
        assert!(!gateway.was_called("create_intent"));
    }

    #[tokio::test]
    async fn network_error_is_retryable() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next("create_intent", GatewayError::network("connection reset"));
        let client = client(&gateway);

        let err = client
            .handle(ObtainIntentCommand {
                request: request("key-1"),
                amount: ten_dollars(),
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn status_reflects_gateway() {
        let gateway = MockPaymentGateway::new();
        let client = client(&gateway);
        let obtained = client
            .handle(ObtainIntentCommand {
                request: request("key-1"),
                amount: ten_dollars(),
            })
            .await
            .unwrap();
        let intent_id = obtained.handle.intent_id;

        assert_eq!(
            client.status(&intent_id).await.unwrap(),
            IntentStatus::RequiresConfirmation
        );
        gateway.force_status(&intent_id, IntentStatus::Succeeded);
        assert_eq!(client.status(&intent_id).await.unwrap(), IntentStatus::Succeeded);
    }

    #[test]
    fn metadata_identifies_payer_and_item() {
        let req = request("key-1");
        let metadata = IntentServiceClient::metadata(&req);
        assert_eq!(metadata["payer_id"], "member-1");
        assert_eq!(metadata["item_id"], req.item_id.to_string());
        assert_eq!(metadata["item_kind"], "event");
    }
}
