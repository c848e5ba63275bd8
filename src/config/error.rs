//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Host and port do not form a socket address")]
    InvalidHost,

    #[error("Checkout origin must start with http:// or https://")]
    InvalidOrigin,

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool needs at least one connection")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Live Stripe key used outside production")]
    LiveKeyOutsideProduction,

    #[error("Currency must be a three-letter ISO code")]
    InvalidCurrency,

    #[error("Invalid gateway base URL")]
    InvalidGatewayUrl,

    #[error("Retry attempts exceed maximum allowed (3)")]
    TooManyRetries,

    #[error("Free-path bucket must be between 1 and 3600 seconds")]
    InvalidFreeBucket,
}
