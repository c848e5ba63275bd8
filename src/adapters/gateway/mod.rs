//! Payment gateway adapters.
//!
//! - `StripePaymentGateway` - Stripe PaymentIntents over REST
//! - `MockPaymentGateway` - In-memory gateway with scripted outcomes

mod mock_gateway;
mod stripe_gateway;

pub use mock_gateway::{ConfirmBehavior, MethodCall, MockPaymentGateway};
pub use stripe_gateway::{StripeGatewayConfig, StripePaymentGateway};
