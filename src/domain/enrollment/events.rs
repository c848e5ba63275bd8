//! Enrollment domain events.
//!
//! Published after the transaction settles, outside the commit boundary:
//! - `EnrollmentCommitted` - Enrollment and payment record were written
//! - `CapacityExceededAfterCharge` - Charge captured but the event was full
//! - `EnrollmentCanceled` - The user abandoned payment

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, EnrollmentId, EventId, ItemId, Money, Timestamp, UserId,
};

use super::{EnrollmentKind, ItemKind, PaymentRef};

// ════════════════════════════════════════════════════════════════════════════
// EnrollmentCommitted
// ════════════════════════════════════════════════════════════════════════════

/// Published when a new enrollment is committed.
///
/// Consumers refresh per-item stats and the payer's enrollment views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentCommitted {
    pub event_id: EventId,
    pub enrollment_id: EnrollmentId,
    pub kind: EnrollmentKind,
    pub payer_id: UserId,
    pub item_id: ItemId,
    pub amount: Money,
    pub payment_ref: PaymentRef,
    pub committed_at: Timestamp,
}

domain_event!(
    EnrollmentCommitted,
    event_type = "enrollment.committed.v1",
    aggregate_id = enrollment_id,
    aggregate_type = "Enrollment",
    occurred_at = committed_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// CapacityExceededAfterCharge
// ════════════════════════════════════════════════════════════════════════════

/// Published when money moved but no seat was left.
///
/// Needs manual compensation; the same fact is in the reconciliation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityExceededAfterCharge {
    pub event_id: EventId,
    pub item_id: ItemId,
    pub payer_id: UserId,
    pub amount: Money,
    pub payment_ref: PaymentRef,
    pub capacity: u32,
    pub detected_at: Timestamp,
}

domain_event!(
    CapacityExceededAfterCharge,
    event_type = "enrollment.capacity_exceeded.v1",
    aggregate_id = item_id,
    aggregate_type = "EnrollableItem",
    occurred_at = detected_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// EnrollmentCanceled
// ════════════════════════════════════════════════════════════════════════════

/// Published when a user abandons payment before it succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentCanceled {
    pub event_id: EventId,
    pub item_id: ItemId,
    pub item_kind: ItemKind,
    pub payer_id: UserId,
    pub canceled_at: Timestamp,
}

domain_event!(
    EnrollmentCanceled,
    event_type = "enrollment.canceled.v1",
    aggregate_id = item_id,
    aggregate_type = "EnrollableItem",
    occurred_at = canceled_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::IntentId;
    use crate::domain::foundation::{DomainEvent, SerializableDomainEvent};

    #[test]
    fn committed_event_envelope() {
        let event = EnrollmentCommitted {
            event_id: EventId::new(),
            enrollment_id: EnrollmentId::new(),
            kind: EnrollmentKind::Registration,
            payer_id: UserId::new("m-1").unwrap(),
            item_id: ItemId::new(),
            amount: Money::from_cents(1000).unwrap(),
            payment_ref: PaymentRef::Intent(IntentId::new("pi_1")),
            committed_at: Timestamp::now(),
        };

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "enrollment.committed.v1");
        assert_eq!(envelope.aggregate_id, event.enrollment_id.to_string());
        assert_eq!(envelope.payload["amount"], 1000);
        assert_eq!(envelope.payload["payment_ref"], "pi_1");
    }

    #[test]
    fn capacity_event_is_keyed_by_item() {
        let item_id = ItemId::new();
        let event = CapacityExceededAfterCharge {
            event_id: EventId::new(),
            item_id,
            payer_id: UserId::new("m-2").unwrap(),
            amount: Money::from_cents(1000).unwrap(),
            payment_ref: PaymentRef::Intent(IntentId::new("pi_2")),
            capacity: 1,
            detected_at: Timestamp::now(),
        };
        assert_eq!(event.aggregate_id(), item_id.to_string());
        assert_eq!(event.event_type(), "enrollment.capacity_exceeded.v1");
    }
}
