//! Enrollment records: memberships in clubs and registrations for events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EnrollmentId, ItemId, Timestamp, UserId};

/// What a successful commit produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentKind {
    Membership,
    Registration,
}

impl EnrollmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentKind::Membership => "membership",
            EnrollmentKind::Registration => "registration",
        }
    }
}

impl std::fmt::Display for EnrollmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnrollmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "membership" => Ok(EnrollmentKind::Membership),
            "registration" => Ok(EnrollmentKind::Registration),
            other => Err(format!("unknown enrollment kind: {}", other)),
        }
    }
}

/// Lifecycle state of an enrollment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    #[default]
    Active,
    Inactive,
}

impl EnrollmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Active => "active",
            EnrollmentState::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for EnrollmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentState::Active),
            "inactive" => Ok(EnrollmentState::Inactive),
            other => Err(format!("unknown enrollment state: {}", other)),
        }
    }
}

/// A payer's enrollment in a club or event.
///
/// At most one active enrollment exists per (payer, item). Only the
/// committer creates enrollments, always together with a payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub kind: EnrollmentKind,
    pub payer_id: UserId,
    pub item_id: ItemId,
    pub state: EnrollmentState,
    /// Joined (membership) or registered (registration) time.
    pub enrolled_at: Timestamp,
}

impl Enrollment {
    /// Creates a new active enrollment.
    pub fn new(kind: EnrollmentKind, payer_id: UserId, item_id: ItemId, enrolled_at: Timestamp) -> Self {
        Self {
            id: EnrollmentId::new(),
            kind,
            payer_id,
            item_id,
            state: EnrollmentState::Active,
            enrolled_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EnrollmentState::Active
    }

    /// True when this enrollment belongs to the given (payer, item) pair.
    pub fn matches(&self, payer_id: &UserId, item_id: &ItemId) -> bool {
        &self.payer_id == payer_id && &self.item_id == item_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_enrollment_is_active() {
        let payer = UserId::new("member-1").unwrap();
        let item = ItemId::new();
        let enrollment = Enrollment::new(
            EnrollmentKind::Membership,
            payer.clone(),
            item,
            Timestamp::now(),
        );

        assert!(enrollment.is_active());
        assert!(enrollment.matches(&payer, &item));
        assert!(!enrollment.matches(&payer, &ItemId::new()));
    }

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in [EnrollmentKind::Membership, EnrollmentKind::Registration] {
            assert_eq!(kind.as_str().parse::<EnrollmentKind>(), Ok(kind));
        }
        assert!("ticket".parse::<EnrollmentKind>().is_err());
    }
}
