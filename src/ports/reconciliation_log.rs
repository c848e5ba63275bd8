//! Reconciliation log port.
//!
//! Durable record of outcomes where money and enrollments may disagree and
//! a human must look: charges captured for a full event, commits that timed
//! out or kept failing after the charge, and charges that landed on an
//! already-enrolled payer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::enrollment::PaymentRef;
use crate::domain::foundation::{DomainError, ItemId, Money, Timestamp, UserId};

#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: ReconciliationEntry) -> Result<(), DomainError>;

    /// All entries, oldest first.
    async fn entries(&self) -> Result<Vec<ReconciliationEntry>, DomainError>;
}

/// Why an entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// Charge captured but the event was full.
    CapacityExceededAfterCharge,
    /// Commit timed out; it may or may not have been applied.
    AmbiguousCommit,
    /// A second intent succeeded for a payer who was already enrolled.
    DuplicateCharge,
    /// Charge captured but the commit kept failing.
    CommitFailedAfterCharge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub kind: ReconciliationKind,
    pub payer_id: UserId,
    pub item_id: ItemId,
    pub amount: Money,
    pub payment_ref: PaymentRef,
    pub detail: String,
    pub recorded_at: Timestamp,
}

impl ReconciliationEntry {
    pub fn new(
        kind: ReconciliationKind,
        payer_id: UserId,
        item_id: ItemId,
        amount: Money,
        payment_ref: PaymentRef,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payer_id,
            item_id,
            amount,
            payment_ref,
            detail: detail.into(),
            recorded_at: Timestamp::now(),
        }
    }
}
