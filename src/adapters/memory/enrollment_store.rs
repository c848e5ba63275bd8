//! In-memory enrollment store.
//!
//! Each item has its own ledger behind a `tokio::sync::Mutex`, so commits
//! for one item are serialized while commits for different items proceed in
//! parallel. The payment-reference index is written under the item lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::domain::enrollment::{Enrollment, PaymentRecord, PaymentRef};
use crate::domain::foundation::{DomainError, EnrollmentId, ItemId, UserId};
use crate::ports::{CommitResult, EnrollmentStore, NewEnrollment};

#[derive(Debug, Default)]
struct ItemLedger {
    enrollments: Vec<Enrollment>,
    records: Vec<PaymentRecord>,
    /// Payment reference each enrollment was committed with.
    refs: HashMap<EnrollmentId, PaymentRef>,
    /// Reverse of `refs`.
    by_payment: HashMap<PaymentRef, EnrollmentId>,
    enrolled: u32,
}

impl ItemLedger {
    fn committed_with(&self, payment_ref: &PaymentRef) -> Option<&Enrollment> {
        let id = self.by_payment.get(payment_ref)?;
        self.enrollments.iter().find(|e| &e.id == id)
    }

    fn active_for(&self, payer_id: &UserId) -> Option<&Enrollment> {
        self.enrollments
            .iter()
            .find(|e| e.is_active() && &e.payer_id == payer_id)
    }
}

/// In-memory enrollment store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryEnrollmentStore {
    ledgers: Arc<RwLock<HashMap<ItemId, Arc<Mutex<ItemLedger>>>>>,
    by_ref: Arc<RwLock<HashMap<PaymentRef, (ItemId, EnrollmentId)>>>,
    failures_remaining: Arc<AtomicUsize>,
    commit_delay: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` commits with a database error, before any write.
    pub fn fail_next_commits(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Hold the item lock for `delay` during the next commit before writing.
    pub async fn delay_next_commit(&self, delay: Duration) {
        *self.commit_delay.lock().await = Some(delay);
    }

    /// Every enrollment for an item, including inactive ones.
    pub async fn enrollments_for_item(&self, item_id: &ItemId) -> Vec<Enrollment> {
        match self.existing_ledger(item_id).await {
            Some(ledger) => ledger.lock().await.enrollments.clone(),
            None => Vec::new(),
        }
    }

    /// Total number of payment records across all items.
    pub async fn payment_record_count(&self) -> usize {
        let ledgers: Vec<_> = self.ledgers.read().await.values().cloned().collect();
        let mut total = 0;
        for ledger in ledgers {
            total += ledger.lock().await.records.len();
        }
        total
    }

    /// Total number of enrollments across all items.
    pub async fn enrollment_total(&self) -> usize {
        let ledgers: Vec<_> = self.ledgers.read().await.values().cloned().collect();
        let mut total = 0;
        for ledger in ledgers {
            total += ledger.lock().await.enrollments.len();
        }
        total
    }

    async fn existing_ledger(&self, item_id: &ItemId) -> Option<Arc<Mutex<ItemLedger>>> {
        self.ledgers.read().await.get(item_id).cloned()
    }

    async fn ledger(&self, item_id: &ItemId) -> Arc<Mutex<ItemLedger>> {
        if let Some(ledger) = self.existing_ledger(item_id).await {
            return ledger;
        }
        self.ledgers
            .write()
            .await
            .entry(*item_id)
            .or_default()
            .clone()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn insert_enrollment_and_payment(
        &self,
        commit: NewEnrollment,
    ) -> Result<CommitResult, DomainError> {
        if self.take_failure() {
            return Err(DomainError::database("enrollment store unavailable"));
        }

        let NewEnrollment {
            enrollment,
            payment_record,
            capacity,
        } = commit;

        let ledger = self.ledger(&enrollment.item_id).await;
        let mut ledger = ledger.lock().await;

        let delay = self.commit_delay.lock().await.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(existing) = ledger.committed_with(&payment_record.payment_ref) {
            return Ok(CommitResult::ExistingForRef {
                enrollment: existing.clone(),
            });
        }

        if let Some(existing) = ledger.active_for(&enrollment.payer_id) {
            return Ok(CommitResult::AlreadyEnrolled {
                enrollment: existing.clone(),
                existing_ref: ledger.refs.get(&existing.id).cloned(),
            });
        }

        if let Some(capacity) = capacity {
            if ledger.enrolled >= capacity {
                return Ok(CommitResult::CapacityExceeded {
                    capacity,
                    enrolled: ledger.enrolled,
                });
            }
        }

        ledger.enrolled += 1;
        ledger.enrollments.push(enrollment.clone());
        ledger.records.push(payment_record.clone());
        ledger
            .refs
            .insert(enrollment.id, payment_record.payment_ref.clone());
        ledger
            .by_payment
            .insert(payment_record.payment_ref.clone(), enrollment.id);
        self.by_ref.write().await.insert(
            payment_record.payment_ref.clone(),
            (enrollment.item_id, enrollment.id),
        );

        Ok(CommitResult::Inserted {
            enrollment,
            payment_record,
        })
    }

    async fn get_enrollment_count(&self, item_id: &ItemId) -> Result<u32, DomainError> {
        Ok(match self.existing_ledger(item_id).await {
            Some(ledger) => ledger.lock().await.enrolled,
            None => 0,
        })
    }

    async fn get_existing_enrollment(
        &self,
        payer_id: &UserId,
        item_id: &ItemId,
    ) -> Result<Option<Enrollment>, DomainError> {
        Ok(match self.existing_ledger(item_id).await {
            Some(ledger) => ledger.lock().await.active_for(payer_id).cloned(),
            None => None,
        })
    }

    async fn find_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Enrollment>, DomainError> {
        let located = self.by_ref.read().await.get(payment_ref).copied();
        let Some((item_id, enrollment_id)) = located else {
            return Ok(None);
        };

        Ok(match self.existing_ledger(&item_id).await {
            Some(ledger) => ledger
                .lock()
                .await
                .enrollments
                .iter()
                .find(|e| e.id == enrollment_id)
                .cloned(),
            None => None,
        })
    }

    async fn list_payment_records(
        &self,
        item_id: &ItemId,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        Ok(match self.existing_ledger(item_id).await {
            Some(ledger) => ledger.lock().await.records.clone(),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::{EnrollmentKind, IntentId, PaymentType};
    use crate::domain::foundation::{Money, Timestamp};

    fn payer(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn commit(payer_id: &str, item_id: ItemId, reference: &str, capacity: Option<u32>) -> NewEnrollment {
        let payer_id = payer(payer_id);
        let now = Timestamp::now();
        NewEnrollment {
            enrollment: Enrollment::new(EnrollmentKind::Registration, payer_id.clone(), item_id, now),
            payment_record: PaymentRecord::completed(
                payer_id,
                PaymentType::Event,
                item_id,
                Money::from_cents(1000).unwrap(),
                PaymentRef::Intent(IntentId::new(reference)),
                now,
            ),
            capacity,
        }
    }

    #[tokio::test]
    async fn insert_increments_count() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();

        let result = store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .unwrap();

        assert!(matches!(result, CommitResult::Inserted { .. }));
        assert_eq!(store.get_enrollment_count(&item).await.unwrap(), 1);
        assert_eq!(store.list_payment_records(&item).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_ref_returns_existing() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();

        let first = store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .unwrap();
        let second = store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .unwrap();

        assert!(matches!(second, CommitResult::ExistingForRef { .. }));
        assert_eq!(first.enrollment().map(|e| e.id), second.enrollment().map(|e| e.id));
        assert_eq!(store.get_enrollment_count(&item).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replay_finds_its_enrollment_among_many() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();
        let mut ids = Vec::new();
        for n in 0..20 {
            let result = store
                .insert_enrollment_and_payment(commit(&format!("m-{}", n), item, &format!("pi_{}", n), None))
                .await
                .unwrap();
            ids.push(result.enrollment().map(|e| e.id));
        }

        let replay = store
            .insert_enrollment_and_payment(commit("m-7", item, "pi_7", None))
            .await
            .unwrap();

        assert!(matches!(replay, CommitResult::ExistingForRef { .. }));
        assert_eq!(replay.enrollment().map(|e| e.id), ids[7]);
        assert_eq!(store.get_enrollment_count(&item).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn second_ref_for_same_pair_reports_already_enrolled() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();

        store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .unwrap();
        let second = store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_2", None))
            .await
            .unwrap();

        match second {
            CommitResult::AlreadyEnrolled { existing_ref, .. } => {
                assert_eq!(existing_ref.map(|r| r.to_string()).as_deref(), Some("pi_1"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.payment_record_count().await, 1);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();

        store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", Some(1)))
            .await
            .unwrap();
        let second = store
            .insert_enrollment_and_payment(commit("m-2", item, "pi_2", Some(1)))
            .await
            .unwrap();

        assert_eq!(
            second,
            CommitResult::CapacityExceeded {
                capacity: 1,
                enrolled: 1
            }
        );
        assert_eq!(store.enrollment_total().await, 1);
    }

    #[tokio::test]
    async fn injected_failure_leaves_store_untouched() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();
        store.fail_next_commits(1);

        assert!(store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .is_err());
        assert_eq!(store.enrollment_total().await, 0);

        assert!(store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_1", None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn find_by_payment_ref_locates_enrollment() {
        let store = InMemoryEnrollmentStore::new();
        let item = ItemId::new();
        let inserted = store
            .insert_enrollment_and_payment(commit("m-1", item, "pi_7", None))
            .await
            .unwrap();

        let found = store
            .find_by_payment_ref(&PaymentRef::Intent(IntentId::new("pi_7")))
            .await
            .unwrap();
        assert_eq!(found.map(|e| e.id), inserted.enrollment().map(|e| e.id));

        let missing = store
            .find_by_payment_ref(&PaymentRef::Intent(IntentId::new("pi_8")))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
