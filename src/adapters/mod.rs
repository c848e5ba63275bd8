//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - In-process event bus
//! - `gateway` - Payment gateways (Stripe, mock)
//! - `http` - Axum routes for enrollment sessions
//! - `memory` - In-memory stores for development and tests
//! - `postgres` - Durable enrollment store and reconciliation log

pub mod events;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;

pub use events::InMemoryEventBus;
pub use gateway::{MockPaymentGateway, StripePaymentGateway};
