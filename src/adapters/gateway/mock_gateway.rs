//! Mock payment gateway for tests and local development.
//!
//! Behaves like an intent-based gateway held in memory:
//! - `create_intent` is idempotent on the idempotency key
//! - confirmation outcomes can be scripted (succeed, decline, error)
//! - errors can be injected per method, once or persistently
//! - every call is recorded for assertions

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::enrollment::{
    ClientSecret, IntentHandle, IntentId, IntentStatus, PaymentDetails, PaymentIntent,
};
use crate::domain::foundation::Money;
use crate::ports::{CreateIntentRequest, GatewayError, PaymentGateway};

/// Mock payment gateway.
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.decline_next("insufficient_funds");
/// gateway.fail_next("create_intent", GatewayError::network("reset"));
///
/// // ... run the orchestrator ...
///
/// assert_eq!(gateway.call_count("create_intent"), 2);
/// assert_eq!(gateway.created_amounts(), vec![Money::from_cents(1000)?]);
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    intents: HashMap<IntentId, PaymentIntent>,

    /// Idempotency key to intent.
    by_key: HashMap<String, IntentId>,

    /// Outcomes for upcoming confirmations; empty means succeed.
    confirm_script: VecDeque<ConfirmBehavior>,

    /// Errors returned on every call of a method.
    method_errors: HashMap<String, GatewayError>,

    /// Errors returned once, in order, per method.
    queued_errors: HashMap<String, VecDeque<GatewayError>>,

    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// Scripted result of one `confirm_intent` call.
#[derive(Debug, Clone)]
pub enum ConfirmBehavior {
    Succeed,
    /// The intent ends `Failed` with this decline reason.
    Decline(String),
    /// The call itself errors.
    Error(GatewayError),
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Queue outcomes for the next confirmations.
    pub fn script_confirmations(&self, behaviors: impl IntoIterator<Item = ConfirmBehavior>) {
        self.state().confirm_script.extend(behaviors);
    }

    /// Decline the next confirmation.
    pub fn decline_next(&self, reason: impl Into<String>) {
        self.state()
            .confirm_script
            .push_back(ConfirmBehavior::Decline(reason.into()));
    }

    /// Fail the next call of `method` once.
    pub fn fail_next(&self, method: &str, error: GatewayError) {
        self.state()
            .queued_errors
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail every call of `method` until cleared.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.method_errors.clear();
        state.queued_errors.clear();
    }

    /// Mark an intent as already succeeded, as if the client confirmed it directly.
    pub fn force_status(&self, intent_id: &IntentId, status: IntentStatus) {
        if let Some(intent) = self.state().intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Amounts of every intent created, in creation order.
    pub fn created_amounts(&self) -> Vec<Money> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == "create_intent")
            .filter_map(|c| c.args.first())
            .filter_map(|cents| cents.parse::<i64>().ok())
            .filter_map(|cents| Money::from_cents(cents).ok())
            .collect()
    }

    pub fn intent(&self, intent_id: &IntentId) -> Option<PaymentIntent> {
        self.state().intents.get(intent_id).cloned()
    }

    /// Number of distinct intents created.
    pub fn intent_count(&self) -> usize {
        self.state().intents.len()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), GatewayError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state
            .queued_errors
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        Ok(())
    }

    fn short_id() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record_call(
            "create_intent",
            vec![
                request.amount.cents().to_string(),
                request.currency.clone(),
                request.idempotency_key.to_string(),
            ],
        );
        self.check_error("create_intent")?;

        if request.amount.is_zero() {
            return Err(GatewayError::invalid_request(
                "amount must be greater than zero",
            ));
        }

        let mut state = self.state();

        if let Some(existing) = state
            .by_key
            .get(request.idempotency_key.as_str())
            .and_then(|id| state.intents.get(id))
        {
            return Ok(existing.clone());
        }

        let id = IntentId::new(format!("pi_mock_{}", Self::short_id()));
        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency,
            status: IntentStatus::RequiresConfirmation,
            client_secret: ClientSecret::new(format!("{}_secret_{}", id, Self::short_id())),
            last_error: None,
        };

        state
            .by_key
            .insert(request.idempotency_key.as_str().to_string(), id.clone());
        state.intents.insert(id, intent.clone());

        Ok(intent)
    }

    async fn confirm_intent(
        &self,
        handle: &IntentHandle,
        details: &PaymentDetails,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record_call(
            "confirm_intent",
            vec![handle.intent_id.to_string(), details.payment_method.clone()],
        );
        self.check_error("confirm_intent")?;

        let mut state = self.state();
        let behavior = state
            .confirm_script
            .pop_front()
            .unwrap_or(ConfirmBehavior::Succeed);

        let intent = state
            .intents
            .get_mut(&handle.intent_id)
            .ok_or_else(|| GatewayError::not_found("PaymentIntent"))?;

        if intent.client_secret != handle.client_secret {
            return Err(GatewayError::invalid_request("client secret does not match"));
        }

        match intent.status {
            IntentStatus::Succeeded => return Ok(intent.clone()),
            IntentStatus::Canceled => {
                return Err(GatewayError::invalid_request(
                    "cannot confirm a canceled intent",
                ))
            }
            _ => {}
        }

        match behavior {
            ConfirmBehavior::Succeed => {
                intent.status = IntentStatus::Succeeded;
                intent.last_error = None;
            }
            ConfirmBehavior::Decline(reason) => {
                intent.status = IntentStatus::Failed;
                intent.last_error = Some(reason);
            }
            ConfirmBehavior::Error(error) => return Err(error),
        }

        Ok(intent.clone())
    }

    async fn retrieve_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError> {
        self.record_call("retrieve_intent", vec![intent_id.to_string()]);
        self.check_error("retrieve_intent")?;

        self.state()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("PaymentIntent"))
    }

    async fn cancel_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError> {
        self.record_call("cancel_intent", vec![intent_id.to_string()]);
        self.check_error("cancel_intent")?;

        let mut state = self.state();
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::not_found("PaymentIntent"))?;

        if intent.status == IntentStatus::Succeeded {
            return Err(GatewayError::invalid_request(
                "cannot cancel a succeeded intent",
            ));
        }

        intent.status = IntentStatus::Canceled;
        Ok(intent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::IdempotencyKey;

    fn request(cents: i64, key: &str) -> CreateIntentRequest {
        CreateIntentRequest {
            amount: Money::from_cents(cents).unwrap(),
            currency: "usd".to_string(),
            metadata: HashMap::new(),
            idempotency_key: IdempotencyKey::new(key).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_on_key() {
        let gateway = MockPaymentGateway::new();

        let first = gateway.create_intent(request(1000, "k1")).await.unwrap();
        let second = gateway.create_intent(request(1000, "k1")).await.unwrap();
        let other = gateway.create_intent(request(1000, "k2")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(gateway.intent_count(), 2);
        assert_eq!(gateway.call_count("create_intent"), 3);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let gateway = MockPaymentGateway::new();
        let err = gateway.create_intent(request(0, "k")).await.unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn confirm_succeeds_by_default() {
        let gateway = MockPaymentGateway::new();
        let intent = gateway.create_intent(request(500, "k")).await.unwrap();

        let confirmed = gateway
            .confirm_intent(&intent.handle(), &PaymentDetails::new("pm_card_visa"))
            .await
            .unwrap();

        assert_eq!(confirmed.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn scripted_decline_then_success() {
        let gateway = MockPaymentGateway::new();
        gateway.decline_next("card_declined");
        let intent = gateway.create_intent(request(500, "k")).await.unwrap();
        let details = PaymentDetails::new("pm_card_visa");

        let first = gateway.confirm_intent(&intent.handle(), &details).await.unwrap();
        assert_eq!(first.status, IntentStatus::Failed);
        assert_eq!(first.last_error.as_deref(), Some("card_declined"));

        let second = gateway.confirm_intent(&intent.handle(), &details).await.unwrap();
        assert_eq!(second.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn queued_error_fires_once() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next("create_intent", GatewayError::network("reset"));

        assert!(gateway.create_intent(request(500, "k")).await.is_err());
        assert!(gateway.create_intent(request(500, "k")).await.is_ok());
    }

    #[tokio::test]
    async fn cancel_blocks_confirmation() {
        let gateway = MockPaymentGateway::new();
        let intent = gateway.create_intent(request(500, "k")).await.unwrap();

        gateway.cancel_intent(&intent.id).await.unwrap();
        let result = gateway
            .confirm_intent(&intent.handle(), &PaymentDetails::new("pm"))
            .await;

        assert!(result.is_err());
        assert_eq!(
            gateway.intent(&intent.id).unwrap().status,
            IntentStatus::Canceled
        );
    }

    #[tokio::test]
    async fn created_amounts_are_tracked() {
        let gateway = MockPaymentGateway::new();
        gateway.create_intent(request(1000, "a")).await.unwrap();
        gateway.create_intent(request(2500, "b")).await.unwrap();

        let cents: Vec<i64> = gateway.created_amounts().iter().map(|m| m.cents()).collect();
        assert_eq!(cents, vec![1000, 2500]);
    }
}
