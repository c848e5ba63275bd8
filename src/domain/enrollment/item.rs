//! Enrollable items: clubs people join and events people register for.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ItemId, Money, ValidationError};

use super::{EnrollmentKind, PaymentType};

/// Kind of enrollable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Joining a club produces a Membership.
    Club,
    /// Registering for an event produces a Registration.
    Event,
}

impl ItemKind {
    /// The enrollment a commit against this kind produces.
    pub fn enrollment_kind(&self) -> EnrollmentKind {
        match self {
            ItemKind::Club => EnrollmentKind::Membership,
            ItemKind::Event => EnrollmentKind::Registration,
        }
    }

    /// The ledger type recorded for a payment against this kind.
    pub fn payment_type(&self) -> PaymentType {
        match self {
            ItemKind::Club => PaymentType::Membership,
            ItemKind::Event => PaymentType::Event,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Club => "club",
            ItemKind::Event => "event",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A club or event as seen by the enrollment transaction.
///
/// # Invariants
///
/// - `fee >= 0` (guaranteed by `Money`)
/// - only events carry `club_id` and `max_attendees`
/// - `max_attendees`, when set, is at least 1
///
/// `enrollment_count` is a snapshot for display; the authoritative count is
/// the one the enrollment store mutates during commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollableItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub fee: Money,
    /// Owning club (events only).
    pub club_id: Option<ItemId>,
    /// Capacity (events only). `None` means unlimited.
    pub max_attendees: Option<u32>,
    pub enrollment_count: u32,
}

impl EnrollableItem {
    /// Creates a club.
    pub fn club(id: ItemId, name: impl Into<String>, fee: Money) -> Self {
        Self {
            id,
            kind: ItemKind::Club,
            name: name.into(),
            fee,
            club_id: None,
            max_attendees: None,
            enrollment_count: 0,
        }
    }

    /// Creates an event owned by a club.
    pub fn event(
        id: ItemId,
        club_id: ItemId,
        name: impl Into<String>,
        fee: Money,
        max_attendees: Option<u32>,
    ) -> Result<Self, ValidationError> {
        if max_attendees == Some(0) {
            return Err(ValidationError::out_of_range(
                "max_attendees",
                1,
                i64::from(u32::MAX),
                0,
            ));
        }
        Ok(Self {
            id,
            kind: ItemKind::Event,
            name: name.into(),
            fee,
            club_id: Some(club_id),
            max_attendees,
            enrollment_count: 0,
        })
    }

    /// Sets the enrollment count snapshot.
    pub fn with_enrollment_count(mut self, count: u32) -> Self {
        self.enrollment_count = count;
        self
    }

    /// Capacity enforced at commit time. Clubs are never capacity-limited.
    pub fn capacity(&self) -> Option<u32> {
        match self.kind {
            ItemKind::Club => None,
            ItemKind::Event => self.max_attendees,
        }
    }

    /// True when the snapshot count already reached capacity.
    pub fn appears_full(&self) -> bool {
        self.capacity()
            .is_some_and(|capacity| self.enrollment_count >= capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee(cents: i64) -> Money {
        Money::from_cents(cents).unwrap()
    }

    #[test]
    fn club_maps_to_membership() {
        let club = EnrollableItem::club(ItemId::new(), "Chess", fee(0));
        assert_eq!(club.kind.enrollment_kind(), EnrollmentKind::Membership);
        assert_eq!(club.kind.payment_type(), PaymentType::Membership);
        assert_eq!(club.capacity(), None);
    }

    #[test]
    fn event_maps_to_registration() {
        let event =
            EnrollableItem::event(ItemId::new(), ItemId::new(), "Open", fee(1000), Some(10))
                .unwrap();
        assert_eq!(event.kind.enrollment_kind(), EnrollmentKind::Registration);
        assert_eq!(event.kind.payment_type(), PaymentType::Event);
        assert_eq!(event.capacity(), Some(10));
    }

    #[test]
    fn event_rejects_zero_capacity() {
        let result = EnrollableItem::event(ItemId::new(), ItemId::new(), "X", fee(0), Some(0));
        assert!(result.is_err());
    }

    #[test]
    fn appears_full_uses_snapshot_count() {
        let event = EnrollableItem::event(ItemId::new(), ItemId::new(), "X", fee(0), Some(2))
            .unwrap()
            .with_enrollment_count(2);
        assert!(event.appears_full());

        let unlimited = EnrollableItem::event(ItemId::new(), ItemId::new(), "Y", fee(0), None)
            .unwrap()
            .with_enrollment_count(500);
        assert!(!unlimited.appears_full());
    }
}
