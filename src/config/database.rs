//! PostgreSQL settings for the enrollment store and reconciliation log

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_POOL_SIZE: u32 = 100;

/// An empty URL means no database; the binary keeps enrollments in memory.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    /// Upper bound on pooled connections. Every commit holds one for the
    /// duration of its item-row lock.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Apply `migrations/` at startup
    #[serde(default)]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.is_configured() {
            return Ok(());
        }
        if !["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
        {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        match self.max_connections {
            0 => Err(ValidationError::InvalidPoolSize),
            n if n > MAX_POOL_SIZE => Err(ValidationError::PoolSizeTooLarge),
            _ => Ok(()),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            run_migrations: false,
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postgres(max_connections: u32) -> DatabaseConfig {
        DatabaseConfig {
            url: "postgresql://localhost/enrollments".to_string(),
            max_connections,
            ..Default::default()
        }
    }

    #[test]
    fn unconfigured_database_is_valid() {
        let config = DatabaseConfig::default();
        assert!(!config.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn only_postgres_urls_are_accepted() {
        let config = DatabaseConfig {
            url: "mysql://localhost/enrollments".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
        assert!(postgres(20).validate().is_ok());
    }

    #[test]
    fn pool_size_is_bounded() {
        assert_eq!(postgres(0).validate(), Err(ValidationError::InvalidPoolSize));
        assert_eq!(postgres(150).validate(), Err(ValidationError::PoolSizeTooLarge));
    }

    #[test]
    fn acquire_timeout_in_seconds() {
        let config = DatabaseConfig {
            acquire_timeout_secs: 10,
            ..Default::default()
        };
        assert_eq!(config.acquire_timeout(), Duration::from_secs(10));
    }
}
