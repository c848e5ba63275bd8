//! Enrollment requests as issued by the UI layer.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{IdempotencyKey, ItemId, Money, Timestamp, UserId};

use super::ItemKind;

/// One user action to join a club or register for an event.
///
/// The idempotency key is generated by the client and stays the same across
/// retries of the same action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub payer_id: UserId,
    pub item_id: ItemId,
    pub kind: ItemKind,
    /// Amount the client displayed; must equal the current fee if present.
    pub asserted_amount: Option<Money>,
    pub idempotency_key: IdempotencyKey,
    pub requested_at: Timestamp,
}

impl EnrollmentRequest {
    pub fn new(
        payer_id: UserId,
        item_id: ItemId,
        kind: ItemKind,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            payer_id,
            item_id,
            kind,
            asserted_amount: None,
            idempotency_key,
            requested_at: Timestamp::now(),
        }
    }

    pub fn with_asserted_amount(mut self, amount: Money) -> Self {
        self.asserted_amount = Some(amount);
        self
    }

    pub fn with_requested_at(mut self, at: Timestamp) -> Self {
        self.requested_at = at;
        self
    }
}
