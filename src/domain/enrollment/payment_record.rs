//! Payment ledger entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::{ItemId, Money, PaymentRecordId, Timestamp, UserId};

use super::IntentId;

/// Ledger type of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Membership,
    Event,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Membership => "membership",
            PaymentType::Event => "event",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "membership" => Ok(PaymentType::Membership),
            "event" => Ok(PaymentType::Event),
            other => Err(format!("unknown payment type: {}", other)),
        }
    }
}

/// Ledger status. Records are only written once money has moved (or the
/// item is free), so the only status is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    #[default]
    Completed,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        "completed"
    }
}

const FREE_PREFIX: &str = "free_";

/// Reference tying a ledger entry to the money movement behind it.
///
/// Paid enrollments reference the gateway intent. Free enrollments carry a
/// synthetic marker derived from (payer, item, time bucket), so a repeated
/// free request inside the same bucket maps to the same reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentRef {
    Intent(IntentId),
    Free(String),
}

impl PaymentRef {
    /// Derives the synthetic reference for a free enrollment.
    pub fn free(payer_id: &UserId, item_id: &ItemId, at: Timestamp, bucket_secs: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payer_id.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(item_id.as_uuid().as_bytes());
        hasher.update(b"|");
        hasher.update(at.bucket(bucket_secs).to_be_bytes());
        let digest = hasher.finalize();

        let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        PaymentRef::Free(format!("{}{}", FREE_PREFIX, hex))
    }

    pub fn is_free(&self) -> bool {
        matches!(self, PaymentRef::Free(_))
    }

    /// The gateway intent, for paid references.
    pub fn intent_id(&self) -> Option<&IntentId> {
        match self {
            PaymentRef::Intent(id) => Some(id),
            PaymentRef::Free(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentRef::Intent(id) => id.as_str(),
            PaymentRef::Free(marker) => marker,
        }
    }
}

impl std::fmt::Display for PaymentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PaymentRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err("payment reference cannot be empty".to_string());
        }
        if value.starts_with(FREE_PREFIX) {
            Ok(PaymentRef::Free(value))
        } else {
            Ok(PaymentRef::Intent(IntentId::new(value)))
        }
    }
}

impl From<PaymentRef> for String {
    fn from(value: PaymentRef) -> Self {
        value.as_str().to_string()
    }
}

/// Durable ledger entry written together with an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentRecordId,
    pub payer_id: UserId,
    pub payment_type: PaymentType,
    pub item_id: ItemId,
    pub amount: Money,
    pub status: PaymentRecordStatus,
    pub payment_ref: PaymentRef,
    pub created_at: Timestamp,
}

impl PaymentRecord {
    pub fn completed(
        payer_id: UserId,
        payment_type: PaymentType,
        item_id: ItemId,
        amount: Money,
        payment_ref: PaymentRef,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: PaymentRecordId::new(),
            payer_id,
            payment_type,
            item_id,
            amount,
            status: PaymentRecordStatus::Completed,
            payment_ref,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payer(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn free_ref_is_stable_within_bucket() {
        let item = ItemId::new();
        let t0 = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let t1 = Timestamp::from_unix_secs(1_700_000_030).unwrap();

        let a = PaymentRef::free(&payer("m-1"), &item, t0, 60);
        let b = PaymentRef::free(&payer("m-1"), &item, t1, 60);

        assert_eq!(a, b);
        assert!(a.is_free());
        assert!(a.as_str().starts_with("free_"));
    }

    #[test]
    fn free_ref_differs_across_payers_items_and_buckets() {
        let item = ItemId::new();
        let t0 = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let later = Timestamp::from_unix_secs(1_700_000_120).unwrap();
        let base = PaymentRef::free(&payer("m-1"), &item, t0, 60);

        assert_ne!(base, PaymentRef::free(&payer("m-2"), &item, t0, 60));
        assert_ne!(base, PaymentRef::free(&payer("m-1"), &ItemId::new(), t0, 60));
        assert_ne!(base, PaymentRef::free(&payer("m-1"), &item, later, 60));
    }

    #[test]
    fn string_form_restores_variant() {
        let intent: PaymentRef = "pi_123".to_string().try_into().unwrap();
        assert_eq!(intent.intent_id().map(|id| id.as_str()), Some("pi_123"));

        let free: PaymentRef = "free_abcd".to_string().try_into().unwrap();
        assert!(free.is_free());

        assert!(PaymentRef::try_from("  ".to_string()).is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let reference = PaymentRef::Intent(IntentId::new("pi_9"));
        assert_eq!(serde_json::to_string(&reference).unwrap(), "\"pi_9\"");
    }
}
