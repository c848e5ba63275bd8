//! Enrollment transaction error taxonomy.
//!
//! | Error | Retried automatically | Surfaced as |
//! |-------|-----------------------|-------------|
//! | InvalidPaymentRequest | no | Failed |
//! | GatewayUnavailable | once | Failed after retry |
//! | PersistenceFailure | once | Failed after retry |
//! | AmbiguousCommit | once | Failed after retry, reconciliation logged |
//! | PaymentFailed | no, user retries on same intent | PaymentDeclined |
//! | Canceled | no | Canceled |
//! | DuplicateEnrollment | no | Enrolled (idempotent success) |
//! | CapacityExceeded | no | PaidButCapacityExceeded when money moved |

use crate::domain::foundation::{
    DomainError, EnrollmentId, ErrorCode, ItemId, ValidationError,
};

use super::FailureReason;

/// Enrollment-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    /// The requested club or event does not exist.
    ItemNotFound(ItemId),

    /// Amount or currency mismatch, or a request the gateway refuses.
    InvalidPaymentRequest { reason: String },

    /// The gateway could not be reached or timed out.
    GatewayUnavailable { reason: String },

    /// The gateway declined the payment.
    PaymentFailed {
        reason: String,
        decline_code: Option<String>,
    },

    /// The user abandoned the payment.
    Canceled,

    /// The payer already holds an active enrollment in the item.
    DuplicateEnrollment { existing: EnrollmentId },

    /// The event is full.
    CapacityExceeded { item_id: ItemId, capacity: u32 },

    /// The enrollment store is unavailable.
    PersistenceFailure { reason: String },

    /// A commit timed out; it may or may not have been applied.
    AmbiguousCommit { payment_ref: String },

    /// Invalid state for the requested operation.
    InvalidState { current: String, attempted: String },

    /// Input validation failed.
    ValidationFailed { field: String, message: String },
}

impl EnrollmentError {
    pub fn item_not_found(id: ItemId) -> Self {
        EnrollmentError::ItemNotFound(id)
    }

    pub fn invalid_payment_request(reason: impl Into<String>) -> Self {
        EnrollmentError::InvalidPaymentRequest {
            reason: reason.into(),
        }
    }

    pub fn gateway_unavailable(reason: impl Into<String>) -> Self {
        EnrollmentError::GatewayUnavailable {
            reason: reason.into(),
        }
    }

    pub fn payment_failed(reason: impl Into<String>, decline_code: Option<String>) -> Self {
        EnrollmentError::PaymentFailed {
            reason: reason.into(),
            decline_code,
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        EnrollmentError::PersistenceFailure {
            reason: reason.into(),
        }
    }

    pub fn ambiguous_commit(payment_ref: impl Into<String>) -> Self {
        EnrollmentError::AmbiguousCommit {
            payment_ref: payment_ref.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        EnrollmentError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EnrollmentError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EnrollmentError::ItemNotFound(_) => ErrorCode::ItemNotFound,
            EnrollmentError::InvalidPaymentRequest { .. } => ErrorCode::InvalidPaymentRequest,
            EnrollmentError::GatewayUnavailable { .. } => ErrorCode::GatewayUnavailable,
            EnrollmentError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            EnrollmentError::Canceled => ErrorCode::PaymentCanceled,
            EnrollmentError::DuplicateEnrollment { .. } => ErrorCode::DuplicateEnrollment,
            EnrollmentError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            EnrollmentError::PersistenceFailure { .. } => ErrorCode::DatabaseError,
            EnrollmentError::AmbiguousCommit { .. } => ErrorCode::AmbiguousCommit,
            EnrollmentError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            EnrollmentError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
        }
    }

    /// Returns a user-facing message.
    pub fn message(&self) -> String {
        match self {
            EnrollmentError::ItemNotFound(id) => format!("Club or event not found: {}", id),
            EnrollmentError::InvalidPaymentRequest { reason } => {
                format!("Payment request rejected: {}", reason)
            }
            EnrollmentError::GatewayUnavailable { .. } => {
                "The payment service is unavailable. Please try again in a moment.".to_string()
            }
            EnrollmentError::PaymentFailed { reason, .. } => {
                format!("Payment was declined: {}", reason)
            }
            EnrollmentError::Canceled => "Payment was canceled".to_string(),
            EnrollmentError::DuplicateEnrollment { .. } => {
                "You are already enrolled".to_string()
            }
            EnrollmentError::CapacityExceeded { capacity, .. } => {
                format!("This event is full ({} attendees)", capacity)
            }
            EnrollmentError::PersistenceFailure { .. } => {
                "We could not save your enrollment. Please try again.".to_string()
            }
            EnrollmentError::AmbiguousCommit { .. } => {
                "Your enrollment is being confirmed. Please check back shortly.".to_string()
            }
            EnrollmentError::InvalidState { current, attempted } => {
                format!("Cannot {} while {}", attempted, current)
            }
            EnrollmentError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
        }
    }

    /// Infrastructure errors the orchestrator retries once with the same key.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EnrollmentError::GatewayUnavailable { .. }
                | EnrollmentError::PersistenceFailure { .. }
                | EnrollmentError::AmbiguousCommit { .. }
        )
    }

    /// Converts this error into the reason carried by a status update.
    pub fn to_reason(&self) -> FailureReason {
        FailureReason {
            code: self.code(),
            message: self.message(),
            retryable: self.is_retryable(),
        }
    }
}

impl std::fmt::Display for EnrollmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message())
    }
}

impl std::error::Error for EnrollmentError {}

impl From<DomainError> for EnrollmentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => EnrollmentError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => {
                EnrollmentError::invalid_state("current state", err.message)
            }
            ErrorCode::Timeout => EnrollmentError::persistence(err.message),
            _ => EnrollmentError::persistence(err.to_string()),
        }
    }
}

impl From<ValidationError> for EnrollmentError {
    fn from(err: ValidationError) -> Self {
        EnrollmentError::validation(err.field().to_string(), err.to_string())
    }
}
