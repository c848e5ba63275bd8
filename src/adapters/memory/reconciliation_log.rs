//! In-memory reconciliation log.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};

#[derive(Debug, Clone, Default)]
pub struct InMemoryReconciliationLog {
    entries: Arc<RwLock<Vec<ReconciliationEntry>>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one kind.
    pub async fn entries_of_kind(&self, kind: ReconciliationKind) -> Vec<ReconciliationEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> Result<(), DomainError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ReconciliationEntry>, DomainError> {
        Ok(self.entries.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::{IntentId, PaymentRef};
    use crate::domain::foundation::{ItemId, Money, UserId};

    #[tokio::test]
    async fn entries_are_kept_in_order() {
        let log = InMemoryReconciliationLog::new();
        for (kind, reference) in [
            (ReconciliationKind::AmbiguousCommit, "pi_1"),
            (ReconciliationKind::CapacityExceededAfterCharge, "pi_2"),
        ] {
            log.record(ReconciliationEntry::new(
                kind,
                UserId::new("m-1").unwrap(),
                ItemId::new(),
                Money::from_cents(1000).unwrap(),
                PaymentRef::Intent(IntentId::new(reference)),
                "test",
            ))
            .await
            .unwrap();
        }

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payment_ref.as_str(), "pi_1");
        assert_eq!(
            log.entries_of_kind(ReconciliationKind::CapacityExceededAfterCharge)
                .await
                .len(),
            1
        );
    }
}
