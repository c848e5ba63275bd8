//! Gateway payment intents as seen by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Money;

/// Gateway-assigned intent identifier (e.g. `pi_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(String);

impl IntentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret handed to the client so it can confirm the intent.
///
/// Never logged; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret([REDACTED])")
    }
}

/// Gateway-side intent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    /// Confirmation in flight at the gateway.
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Succeeded | IntentStatus::Canceled)
    }
}

/// Intent snapshot returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub amount: Money,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: ClientSecret,
    /// Gateway decline reason when `status` is `Failed`.
    pub last_error: Option<String>,
}

impl PaymentIntent {
    pub fn handle(&self) -> IntentHandle {
        IntentHandle {
            intent_id: self.id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

/// What the orchestrator keeps of an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentHandle {
    pub intent_id: IntentId,
    pub client_secret: ClientSecret,
}

/// Payment details the client submits to confirm an intent.
///
/// Card data never reaches this service; the client tokenizes it and only
/// the resulting payment method reference is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

impl PaymentDetails {
    pub fn new(payment_method: impl Into<String>) -> Self {
        Self {
            payment_method: payment_method.into(),
            return_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_secret_debug_is_redacted() {
        let secret = ClientSecret::new("pi_1_secret_abc");
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("abc"));
        assert_eq!(secret.expose(), "pi_1_secret_abc");
    }

    #[test]
    fn only_succeeded_and_canceled_are_terminal() {
        assert!(IntentStatus::Succeeded.is_terminal());
        assert!(IntentStatus::Canceled.is_terminal());
        assert!(!IntentStatus::Failed.is_terminal());
        assert!(!IntentStatus::Processing.is_terminal());
    }

    #[test]
    fn handle_copies_id_and_secret() {
        let intent = PaymentIntent {
            id: IntentId::new("pi_1"),
            amount: Money::from_cents(1000).unwrap(),
            currency: "usd".to_string(),
            status: IntentStatus::RequiresConfirmation,
            client_secret: ClientSecret::new("s"),
            last_error: None,
        };
        let handle = intent.handle();
        assert_eq!(handle.intent_id.as_str(), "pi_1");
        assert_eq!(handle.client_secret.expose(), "s");
    }
}
