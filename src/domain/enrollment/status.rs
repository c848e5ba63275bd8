//! Status updates streamed to the UI and terminal outcomes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EnrollmentId, ErrorCode};

use super::{ClientSecret, PaymentRef};

/// Why an enrollment attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub code: ErrorCode,
    pub message: String,
    /// True when repeating the same action may succeed.
    pub retryable: bool,
}

/// Progress of one enrollment session, in the order the UI sees it.
///
/// `Enrolled`, `PaidButCapacityExceeded`, `Failed` and `Canceled` are
/// terminal; the stream ends after one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// The client must collect payment details and submit them.
    AwaitingPaymentDetails { client_secret: ClientSecret },
    Processing,
    /// The gateway declined; the client may submit new details for the same intent.
    PaymentDeclined(FailureReason),
    Enrolled { enrollment_id: EnrollmentId },
    /// The charge went through but the event filled up first.
    PaidButCapacityExceeded { payment_ref: PaymentRef },
    Failed(FailureReason),
    Canceled,
}

impl EnrollmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Enrolled { .. }
                | EnrollmentStatus::PaidButCapacityExceeded { .. }
                | EnrollmentStatus::Failed(_)
                | EnrollmentStatus::Canceled
        )
    }

    /// SSE event name for this status.
    pub fn name(&self) -> &'static str {
        match self {
            EnrollmentStatus::AwaitingPaymentDetails { .. } => "awaiting_payment_details",
            EnrollmentStatus::Processing => "processing",
            EnrollmentStatus::PaymentDeclined(_) => "payment_declined",
            EnrollmentStatus::Enrolled { .. } => "enrolled",
            EnrollmentStatus::PaidButCapacityExceeded { .. } => "paid_but_capacity_exceeded",
            EnrollmentStatus::Failed(_) => "failed",
            EnrollmentStatus::Canceled => "canceled",
        }
    }
}

impl From<EnrollmentOutcome> for EnrollmentStatus {
    fn from(outcome: EnrollmentOutcome) -> Self {
        match outcome {
            EnrollmentOutcome::Enrolled { enrollment_id, .. } => {
                EnrollmentStatus::Enrolled { enrollment_id }
            }
            EnrollmentOutcome::PaidButCapacityExceeded { payment_ref } => {
                EnrollmentStatus::PaidButCapacityExceeded { payment_ref }
            }
            EnrollmentOutcome::Failed(reason) => EnrollmentStatus::Failed(reason),
            EnrollmentOutcome::Canceled => EnrollmentStatus::Canceled,
        }
    }
}

/// Terminal result of an enrollment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollmentOutcome {
    Enrolled {
        enrollment_id: EnrollmentId,
        /// The payer was enrolled by an earlier attempt.
        already_enrolled: bool,
    },
    PaidButCapacityExceeded { payment_ref: PaymentRef },
    Failed(FailureReason),
    Canceled,
}

impl EnrollmentOutcome {
    pub fn enrollment_id(&self) -> Option<EnrollmentId> {
        match self {
            EnrollmentOutcome::Enrolled { enrollment_id, .. } => Some(*enrollment_id),
            _ => None,
        }
    }

    pub fn is_enrolled(&self) -> bool {
        matches!(self, EnrollmentOutcome::Enrolled { .. })
    }
}
