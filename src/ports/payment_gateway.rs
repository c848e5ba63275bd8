//! Payment gateway port.
//!
//! Two-phase intent/confirm contract (e.g. Stripe PaymentIntents). The
//! gateway's internals are opaque; the orchestrator only keeps intent ids
//! and client secrets.
//!
//! # Design
//!
//! - **Gateway agnostic**: Interface works with any intent-based provider
//! - **Idempotent**: `create_intent` carries the caller's idempotency key

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::enrollment::{EnrollmentError, IntentHandle, IntentId, PaymentDetails, PaymentIntent};
use crate::domain::foundation::{IdempotencyKey, Money};

/// Port for payment gateway integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for a strictly positive amount.
    ///
    /// Repeated calls with the same idempotency key return the same intent.
    async fn create_intent(&self, request: CreateIntentRequest)
        -> Result<PaymentIntent, GatewayError>;

    /// Confirm an intent with client-supplied payment details.
    ///
    /// A decline is reported as an intent with `IntentStatus::Failed`, not
    /// as an error; errors mean the gateway could not process the call.
    async fn confirm_intent(
        &self,
        handle: &IntentHandle,
        details: &PaymentDetails,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Get the current state of an intent.
    async fn retrieve_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError>;

    /// Cancel an intent that has not succeeded.
    async fn cancel_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError>;
}

/// Request to create a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: Money,

    /// ISO currency code, lowercase (e.g. "usd").
    pub currency: String,

    /// Stored on the intent for reconciliation (payer, item, kind).
    pub metadata: HashMap<String, String>,

    /// Forwarded to the gateway so retried calls do not create a second intent.
    pub idempotency_key: IdempotencyKey,
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthenticationError, message)
    }

    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::CardDeclined, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidRequest, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for EnrollmentError {
    fn from(err: GatewayError) -> Self {
        match err.code {
            GatewayErrorCode::CardDeclined
            | GatewayErrorCode::InsufficientFunds
            | GatewayErrorCode::CardExpired => {
                EnrollmentError::payment_failed(err.message, err.provider_code)
            }
            GatewayErrorCode::InvalidRequest | GatewayErrorCode::NotFound => {
                EnrollmentError::invalid_payment_request(err.message)
            }
            _ => EnrollmentError::gateway_unavailable(err.to_string()),
        }
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// The gateway did not answer in time.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Card was declined.
    CardDeclined,

    /// Insufficient funds.
    InsufficientFunds,

    /// Card expired.
    CardExpired,

    /// The gateway rejected the request (amount, currency, state).
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::RateLimitExceeded
                | GatewayErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::CardDeclined => "card_declined",
            GatewayErrorCode::InsufficientFunds => "insufficient_funds",
            GatewayErrorCode::CardExpired => "card_expired",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn gateway_error_retryable() {
        assert!(GatewayErrorCode::NetworkError.is_retryable());
        assert!(GatewayErrorCode::Timeout.is_retryable());
        assert!(!GatewayErrorCode::CardDeclined.is_retryable());
        assert!(!GatewayErrorCode::InvalidRequest.is_retryable());
    }

    #[test]
    fn network_error_becomes_gateway_unavailable() {
        let err: EnrollmentError = GatewayError::network("connection reset").into();
        assert!(matches!(err, EnrollmentError::GatewayUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn rejected_request_is_not_retried() {
        let err: EnrollmentError = GatewayError::invalid_request("amount too small").into();
        assert!(matches!(err, EnrollmentError::InvalidPaymentRequest { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn decline_keeps_provider_code() {
        let err: EnrollmentError = GatewayError::card_declined("Your card was declined")
            .with_provider_code("insufficient_funds")
            .into();
        match err {
            EnrollmentError::PaymentFailed { decline_code, .. } => {
                assert_eq!(decline_code.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
