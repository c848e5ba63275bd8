//! HTTP DTOs for enrollment endpoints.
//!
//! Statuses themselves are streamed as serialized `EnrollmentStatus` values,
//! so only the command bodies and the error envelope live here.

use serde::{Deserialize, Serialize};

use crate::domain::enrollment::{ItemKind, PaymentDetails};
use crate::domain::foundation::{ItemId, Money};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to join a club or register for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct StartEnrollmentRequest {
    pub item_id: ItemId,
    pub kind: ItemKind,
    /// Amount shown to the user, in cents. Rejected if it differs from the fee.
    #[serde(default)]
    pub amount: Option<Money>,
    /// Client-generated key, stable across retries of one button press.
    pub idempotency_key: String,
}

/// Payment details collected by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_method: String,
    #[serde(default)]
    pub return_url: Option<String>,
}

impl From<ConfirmPaymentRequest> for PaymentDetails {
    fn from(req: ConfirmPaymentRequest) -> Self {
        Self {
            payment_method: req.payment_method,
            return_url: req.return_url,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Returned when a session has been started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartEnrollmentResponse {
    pub session_id: String,
    /// Where to subscribe for status updates.
    pub events_url: String,
}

/// Error response format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether repeating the request may succeed.
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_deserializes_without_amount() {
        let item_id = ItemId::new();
        let json = format!(
            r#"{{"item_id":"{}","kind":"club","idempotency_key":"click-1"}}"#,
            item_id
        );

        let req: StartEnrollmentRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(req.item_id, item_id);
        assert_eq!(req.kind, ItemKind::Club);
        assert!(req.amount.is_none());
    }

    #[test]
    fn start_request_rejects_negative_amount() {
        let json = format!(
            r#"{{"item_id":"{}","kind":"event","amount":-5,"idempotency_key":"k"}}"#,
            ItemId::new()
        );

        assert!(serde_json::from_str::<StartEnrollmentRequest>(&json).is_err());
    }

    #[test]
    fn confirm_request_maps_to_payment_details() {
        let req: ConfirmPaymentRequest =
            serde_json::from_str(r#"{"payment_method":"pm_card_visa"}"#).unwrap();

        let details = PaymentDetails::from(req);

        assert_eq!(details.payment_method, "pm_card_visa");
        assert!(details.return_url.is_none());
    }

    #[test]
    fn error_response_omits_nothing() {
        let body = serde_json::to_value(ErrorResponse::new("ITEM_NOT_FOUND", "gone")).unwrap();
        assert_eq!(body["error_code"], "ITEM_NOT_FOUND");
        assert_eq!(body["retryable"], false);
    }
}
