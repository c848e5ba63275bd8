//! Enrollment store port.
//!
//! The store owns the uniqueness constraints and the per-item capacity
//! counter. `insert_enrollment_and_payment` is the only write path and is
//! atomic: capacity check, uniqueness check, enrollment insert, payment
//! record insert and counter increment all happen or none do.
//!
//! # Design
//!
//! - **Serialized per item**: concurrent commits for one item are ordered;
//!   commits for different items never wait on each other
//! - **Idempotent**: a `payment_ref` is committed at most once
//! - **Unique pair**: one active enrollment per (payer, item)

use async_trait::async_trait;

use crate::domain::enrollment::{Enrollment, PaymentRecord, PaymentRef};
use crate::domain::foundation::{DomainError, ItemId, UserId};

/// Repository port for enrollments and their payment records.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Atomically commit an enrollment with its payment record.
    ///
    /// Outcomes other than `Inserted` leave the store unchanged.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert_enrollment_and_payment(
        &self,
        commit: NewEnrollment,
    ) -> Result<CommitResult, DomainError>;

    /// Current number of active enrollments for an item.
    async fn get_enrollment_count(&self, item_id: &ItemId) -> Result<u32, DomainError>;

    /// Active enrollment for the (payer, item) pair, if any.
    async fn get_existing_enrollment(
        &self,
        payer_id: &UserId,
        item_id: &ItemId,
    ) -> Result<Option<Enrollment>, DomainError>;

    /// Enrollment committed with the given payment reference, if any.
    async fn find_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Enrollment>, DomainError>;

    /// Payment records for an item, oldest first.
    async fn list_payment_records(&self, item_id: &ItemId)
        -> Result<Vec<PaymentRecord>, DomainError>;
}

/// Everything one commit writes.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub enrollment: Enrollment,
    pub payment_record: PaymentRecord,
    /// Capacity to enforce; `None` for unlimited items.
    pub capacity: Option<u32>,
}

/// Result of an atomic commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Enrollment and payment record were written; the count went up by one.
    Inserted {
        enrollment: Enrollment,
        payment_record: PaymentRecord,
    },

    /// This payment reference was already committed.
    ExistingForRef { enrollment: Enrollment },

    /// The pair already holds an active enrollment under another reference.
    AlreadyEnrolled {
        enrollment: Enrollment,
        existing_ref: Option<PaymentRef>,
    },

    /// No seat left.
    CapacityExceeded { capacity: u32, enrolled: u32 },
}

impl CommitResult {
    pub fn enrollment(&self) -> Option<&Enrollment> {
        match self {
            CommitResult::Inserted { enrollment, .. }
            | CommitResult::ExistingForRef { enrollment }
            | CommitResult::AlreadyEnrolled { enrollment, .. } => Some(enrollment),
            CommitResult::CapacityExceeded { .. } => None,
        }
    }
}
