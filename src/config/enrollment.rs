//! Enrollment transaction configuration

use serde::Deserialize;
use std::time::Duration;

use crate::application::handlers::enrollment::OrchestratorConfig;

use super::error::ValidationError;

/// Timeouts and retry policy for the enrollment transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentConfig {
    /// Bound on each payment gateway call, in milliseconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_ms: u64,

    /// Bound on the enrollment commit, in milliseconds. Expiry is an ambiguous commit.
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_ms: u64,

    /// Automatic retries for gateway outages and persistence failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Width of the time bucket free-path payment references are derived from
    #[serde(default = "default_free_bucket")]
    pub free_bucket_secs: u64,

    /// Interval between status checks while the gateway reports `processing`
    #[serde(default = "default_processing_poll")]
    pub processing_poll_ms: u64,

    #[serde(default = "default_processing_attempts")]
    pub processing_poll_attempts: u32,

    /// How long an HTTP session may wait for its event stream to be opened
    /// before it is abandoned
    #[serde(default = "default_stream_claim")]
    pub stream_claim_secs: u64,
}

impl EnrollmentConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn stream_claim_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_claim_secs)
    }

    pub fn processing_poll(&self) -> Duration {
        Duration::from_millis(self.processing_poll_ms)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            free_bucket_secs: self.free_bucket_secs,
            ..OrchestratorConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.gateway_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("enrollment.gateway_timeout_ms"));
        }
        if self.commit_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("enrollment.commit_timeout_ms"));
        }
        if self.stream_claim_secs == 0 {
            return Err(ValidationError::InvalidTimeout("enrollment.stream_claim_secs"));
        }
        if self.max_retries > 3 {
            return Err(ValidationError::TooManyRetries);
        }
        if self.free_bucket_secs == 0 || self.free_bucket_secs > 3600 {
            return Err(ValidationError::InvalidFreeBucket);
        }
        Ok(())
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_ms: default_gateway_timeout(),
            commit_timeout_ms: default_commit_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            free_bucket_secs: default_free_bucket(),
            processing_poll_ms: default_processing_poll(),
            processing_poll_attempts: default_processing_attempts(),
            stream_claim_secs: default_stream_claim(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    10_000
}

fn default_commit_timeout() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    200
}

fn default_free_bucket() -> u64 {
    60
}

fn default_processing_poll() -> u64 {
    500
}

fn default_processing_attempts() -> u32 {
    6
}

fn default_stream_claim() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_retry_once() {
        let config = EnrollmentConfig::default();
        assert_eq!(config.max_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_config_carries_policy() {
        let config = EnrollmentConfig {
            max_retries: 2,
            retry_backoff_ms: 50,
            free_bucket_secs: 30,
            ..Default::default()
        };
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.max_retries, 2);
        assert_eq!(orchestrator.retry_backoff, Duration::from_millis(50));
        assert_eq!(orchestrator.free_bucket_secs, 30);
    }

    #[test]
    fn test_zero_commit_timeout_rejected() {
        let config = EnrollmentConfig {
            commit_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidTimeout("enrollment.commit_timeout_ms"))
        );
    }

    #[test]
    fn test_zero_stream_claim_rejected() {
        let config = EnrollmentConfig {
            stream_claim_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidTimeout("enrollment.stream_claim_secs"))
        );
    }

    #[test]
    fn test_free_bucket_bounds() {
        let config = EnrollmentConfig {
            free_bucket_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidFreeBucket));
    }
}
