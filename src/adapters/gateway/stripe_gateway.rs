//! Stripe PaymentIntents adapter.
//!
//! Implements `PaymentGateway` against the Stripe REST API:
//! - `POST /v1/payment_intents` with an `Idempotency-Key` header
//! - `POST /v1/payment_intents/{id}/confirm`
//! - `POST /v1/payment_intents/{id}/cancel`
//! - `GET /v1/payment_intents/{id}`
//!
//! The API key is held as a `secrecy::SecretString` and only exposed when
//! building the request.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::enrollment::{
    ClientSecret, IntentHandle, IntentId, IntentStatus, PaymentDetails, PaymentIntent,
};
use crate::domain::foundation::Money;
use crate::ports::{CreateIntentRequest, GatewayError, GatewayErrorCode, PaymentGateway};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeGatewayConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    request_timeout: Duration,
}

impl StripeGatewayConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stripe payment gateway adapter.
pub struct StripePaymentGateway {
    config: StripeGatewayConfig,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    pub fn new(config: StripeGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::new(GatewayErrorCode::Unknown, e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn intent_url(&self, suffix: &str) -> String {
        format!("{}/v1/payment_intents{}", self.config.api_base_url, suffix)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<StripeIntent, GatewayError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_response(status, &body));
        }

        response.json::<StripeIntent>().await.map_err(|e| {
            GatewayError::new(
                GatewayErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if request.amount.is_zero() {
            return Err(GatewayError::invalid_request(
                "amount must be greater than zero",
            ));
        }

        let mut params = vec![
            ("amount".to_string(), request.amount.cents().to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        let builder = self
            .http_client
            .post(self.intent_url(""))
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&params);

        let intent = self.send(builder).await?;
        tracing::debug!(intent_id = %intent.id, "Stripe payment intent created");
        intent.into_domain()
    }

    async fn confirm_intent(
        &self,
        handle: &IntentHandle,
        details: &PaymentDetails,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut params = vec![("payment_method", details.payment_method.clone())];
        if let Some(return_url) = &details.return_url {
            params.push(("return_url", return_url.clone()));
        }

        let builder = self
            .http_client
            .post(self.intent_url(&format!("/{}/confirm", handle.intent_id)))
            .form(&params);

        match self.send(builder).await {
            Ok(intent) => intent.into_domain(),
            // Stripe answers a decline with 402 and the failed intent in the error body
            Err(err) if err.code == GatewayErrorCode::CardDeclined => {
                let mut intent = self.retrieve_intent(&handle.intent_id).await?;
                intent.status = IntentStatus::Failed;
                if intent.last_error.is_none() {
                    intent.last_error = Some(err.message);
                }
                Ok(intent)
            }
            Err(err) => Err(err),
        }
    }

    async fn retrieve_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError> {
        let builder = self.http_client.get(self.intent_url(&format!("/{}", intent_id)));
        self.send(builder).await?.into_domain()
    }

    async fn cancel_intent(&self, intent_id: &IntentId) -> Result<PaymentIntent, GatewayError> {
        let builder = self
            .http_client
            .post(self.intent_url(&format!("/{}/cancel", intent_id)))
            .form(&[("cancellation_reason", "abandoned")]);

        self.send(builder).await?.into_domain()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Stripe wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    last_payment_error: Option<StripeErrorBody>,
}

impl StripeIntent {
    fn into_domain(self) -> Result<PaymentIntent, GatewayError> {
        let amount = Money::from_cents(self.amount).map_err(|e| {
            GatewayError::new(GatewayErrorCode::ProviderError, e.to_string())
        })?;
        let last_error = self
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.code.clone()));
        let status = map_status(&self.status, last_error.is_some());

        Ok(PaymentIntent {
            id: IntentId::new(self.id),
            amount,
            currency: self.currency,
            status,
            client_secret: ClientSecret::new(self.client_secret.unwrap_or_default()),
            last_error,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps a Stripe intent status to the gateway-neutral status.
///
/// `requires_payment_method` is both the initial state and the state after
/// a decline; the presence of `last_payment_error` tells them apart.
fn map_status(status: &str, has_error: bool) -> IntentStatus {
    match status {
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        "processing" | "requires_action" | "requires_capture" => IntentStatus::Processing,
        "requires_payment_method" if has_error => IntentStatus::Failed,
        _ => IntentStatus::RequiresConfirmation,
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout(err.to_string())
    } else {
        GatewayError::network(err.to_string())
    }
}

fn map_error_response(status: reqwest::StatusCode, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|p| p.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status.as_u16() {
        402 => match parsed.as_ref().and_then(|p| p.error.code.as_deref()) {
            Some("expired_card") => GatewayErrorCode::CardExpired,
            _ if parsed
                .as_ref()
                .and_then(|p| p.error.decline_code.as_deref())
                == Some("insufficient_funds") =>
            {
                GatewayErrorCode::InsufficientFunds
            }
            _ => GatewayErrorCode::CardDeclined,
        },
        400 if parsed.as_ref().and_then(|p| p.error.kind.as_deref()) == Some("card_error") => {
            GatewayErrorCode::CardDeclined
        }
        400 | 409 => GatewayErrorCode::InvalidRequest,
        401 | 403 => GatewayErrorCode::AuthenticationError,
        404 => GatewayErrorCode::NotFound,
        429 => GatewayErrorCode::RateLimitExceeded,
        500..=599 => GatewayErrorCode::ProviderError,
        _ => GatewayErrorCode::Unknown,
    };

    tracing::warn!(status = %status, code = %code, "Stripe request failed");

    let error = GatewayError::new(code, message);
    match parsed.and_then(|p| p.error.decline_code.or(p.error.code)) {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_with_base_url_trims_slash() {
        let config = StripeGatewayConfig::new(SecretString::new("sk_test".to_string()))
            .with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("succeeded", false), IntentStatus::Succeeded);
        assert_eq!(map_status("canceled", false), IntentStatus::Canceled);
        assert_eq!(map_status("processing", false), IntentStatus::Processing);
        assert_eq!(
            map_status("requires_payment_method", false),
            IntentStatus::RequiresConfirmation
        );
        assert_eq!(
            map_status("requires_payment_method", true),
            IntentStatus::Failed
        );
    }

    #[test]
    fn parses_intent_payload() {
        let json = r#"{
            "id": "pi_123",
            "amount": 1000,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_123_secret_abc",
            "last_payment_error": null
        }"#;
        let intent: StripeIntent = serde_json::from_str(json).unwrap();
        let intent = intent.into_domain().unwrap();

        assert_eq!(intent.id.as_str(), "pi_123");
        assert_eq!(intent.amount.cents(), 1000);
        assert_eq!(intent.status, IntentStatus::RequiresConfirmation);
        assert_eq!(intent.client_secret.expose(), "pi_123_secret_abc");
    }

    #[test]
    fn decline_response_maps_to_card_declined() {
        let body = r#"{"error": {"type": "card_error", "code": "card_declined",
            "decline_code": "generic_decline", "message": "Your card was declined."}}"#;
        let err = map_error_response(reqwest::StatusCode::PAYMENT_REQUIRED, body);

        assert_eq!(err.code, GatewayErrorCode::CardDeclined);
        assert_eq!(err.provider_code.as_deref(), Some("generic_decline"));
        assert_eq!(err.message, "Your card was declined.");
        assert!(!err.retryable);
    }

    #[test]
    fn insufficient_funds_is_distinguished() {
        let body = r#"{"error": {"type": "card_error", "code": "card_declined",
            "decline_code": "insufficient_funds", "message": "Insufficient funds."}}"#;
        let err = map_error_response(reqwest::StatusCode::PAYMENT_REQUIRED, body);
        assert_eq!(err.code, GatewayErrorCode::InsufficientFunds);
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = map_error_response(reqwest::StatusCode::BAD_GATEWAY, "upstream");
        assert_eq!(err.code, GatewayErrorCode::ProviderError);
        assert!(err.retryable);
    }

    #[test]
    fn bad_request_is_invalid_request() {
        let body = r#"{"error": {"type": "invalid_request_error",
            "message": "Amount must be at least $0.50 usd"}}"#;
        let err = map_error_response(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code, GatewayErrorCode::InvalidRequest);
        assert!(err.message.contains("Amount must be"));
    }
}
