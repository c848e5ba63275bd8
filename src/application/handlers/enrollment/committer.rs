//! EnrollmentCommitter - Writes the enrollment and its payment record.
//!
//! The store performs the capacity check, the uniqueness checks and both
//! inserts as one atomic unit. The committer builds the records, bounds the
//! call with a timeout, and turns the store's verdict into an outcome.
//! Outcomes where money and enrollments may disagree go to the
//! reconciliation log.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::enrollment::{
    EnrollableItem, Enrollment, EnrollmentError, PaymentRecord, PaymentRef,
};
use crate::domain::foundation::{ItemId, Money, Timestamp, UserId};
use crate::ports::{
    CommitResult, EnrollmentStore, NewEnrollment, ReconciliationEntry, ReconciliationKind,
    ReconciliationLog,
};

/// Command to commit one enrollment.
#[derive(Debug, Clone)]
pub struct CommitEnrollmentCommand {
    pub payer_id: UserId,
    pub item: EnrollableItem,
    pub amount: Money,
    pub payment_ref: PaymentRef,
}

/// Successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub enrollment: Enrollment,
    /// False when an earlier commit already produced this enrollment.
    pub newly_created: bool,
}

pub struct EnrollmentCommitter {
    store: Arc<dyn EnrollmentStore>,
    reconciliation: Arc<dyn ReconciliationLog>,
    commit_timeout: Duration,
}

impl EnrollmentCommitter {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        reconciliation: Arc<dyn ReconciliationLog>,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            reconciliation,
            commit_timeout,
        }
    }

    /// Active enrollment of the payer in the item, if any.
    pub async fn existing_enrollment(
        &self,
        payer_id: &UserId,
        item_id: &ItemId,
    ) -> Result<Option<Enrollment>, EnrollmentError> {
        Ok(self.store.get_existing_enrollment(payer_id, item_id).await?)
    }

    /// Committed seats for an item.
    pub async fn enrollment_count(&self, item_id: &ItemId) -> Result<u32, EnrollmentError> {
        Ok(self.store.get_enrollment_count(item_id).await?)
    }

    pub async fn handle(&self, cmd: CommitEnrollmentCommand) -> Result<CommitOutcome, EnrollmentError> {
        let now = Timestamp::now();
        let enrollment = Enrollment::new(
            cmd.item.kind.enrollment_kind(),
            cmd.payer_id.clone(),
            cmd.item.id,
            now,
        );
        let payment_record = PaymentRecord::completed(
            cmd.payer_id.clone(),
            cmd.item.kind.payment_type(),
            cmd.item.id,
            cmd.amount,
            cmd.payment_ref.clone(),
            now,
        );
        let commit = NewEnrollment {
            enrollment,
            payment_record,
            capacity: cmd.item.capacity(),
        };

        let result = match tokio::time::timeout(
            self.commit_timeout,
            self.store.insert_enrollment_and_payment(commit),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(
                    payment_ref = %cmd.payment_ref,
                    item_id = %cmd.item.id,
                    error = %err,
                    "Enrollment commit failed"
                );
                return Err(EnrollmentError::persistence(err.message));
            }
            Err(_) => {
                error!(
                    reconciliation = true,
                    payment_ref = %cmd.payment_ref,
                    payer_id = %cmd.payer_id,
                    item_id = %cmd.item.id,
                    timeout_ms = self.commit_timeout.as_millis() as u64,
                    "Enrollment commit timed out; outcome unknown"
                );
                self.reconcile(
                    ReconciliationKind::AmbiguousCommit,
                    &cmd,
                    format!("commit timed out after {:?}", self.commit_timeout),
                )
                .await;
                return Err(EnrollmentError::ambiguous_commit(cmd.payment_ref.as_str()));
            }
        };

        match result {
            CommitResult::Inserted { enrollment, .. } => {
                info!(
                    enrollment_id = %enrollment.id,
                    payer_id = %cmd.payer_id,
                    item_id = %cmd.item.id,
                    payment_ref = %cmd.payment_ref,
                    amount = cmd.amount.cents(),
                    "Enrollment committed"
                );
                Ok(CommitOutcome {
                    enrollment,
                    newly_created: true,
                })
            }
            CommitResult::ExistingForRef { enrollment } => {
                info!(
                    enrollment_id = %enrollment.id,
                    payment_ref = %cmd.payment_ref,
                    "Payment reference already committed"
                );
                Ok(CommitOutcome {
                    enrollment,
                    newly_created: false,
                })
            }
            CommitResult::AlreadyEnrolled {
                enrollment,
                existing_ref,
            } => {
                let charged_again = !cmd.payment_ref.is_free()
                    && existing_ref.as_ref() != Some(&cmd.payment_ref);
                if charged_again {
                    error!(
                        reconciliation = true,
                        enrollment_id = %enrollment.id,
                        payment_ref = %cmd.payment_ref,
                        payer_id = %cmd.payer_id,
                        item_id = %cmd.item.id,
                        "Payer charged again for an existing enrollment"
                    );
                    self.reconcile(
                        ReconciliationKind::DuplicateCharge,
                        &cmd,
                        format!("payer already enrolled as {}", enrollment.id),
                    )
                    .await;
                }
                Ok(CommitOutcome {
                    enrollment,
                    newly_created: false,
                })
            }
            CommitResult::CapacityExceeded { capacity, enrolled } => {
                warn!(
                    item_id = %cmd.item.id,
                    capacity,
                    enrolled,
                    "Item is full"
                );
                Err(EnrollmentError::CapacityExceeded {
                    item_id: cmd.item.id,
                    capacity,
                })
            }
        }
    }

    /// Writes a reconciliation entry for a commit that moved money.
    pub async fn reconcile(
        &self,
        kind: ReconciliationKind,
        cmd: &CommitEnrollmentCommand,
        detail: String,
    ) {
        if cmd.payment_ref.is_free() {
            return;
        }
        let entry = ReconciliationEntry::new(
            kind,
            cmd.payer_id.clone(),
            cmd.item.id,
            cmd.amount,
            cmd.payment_ref.clone(),
            detail,
        );
        if let Err(err) = self.reconciliation.record(entry).await {
            // The structured log line above is the fallback record.
            error!(
                reconciliation = true,
                payment_ref = %cmd.payment_ref,
                error = %err,
                "Failed to write reconciliation entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEnrollmentStore, InMemoryReconciliationLog};
    use crate::domain::enrollment::IntentId;
    use crate::domain::foundation::DomainError;
    use async_trait::async_trait;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    /// Store that never answers in time.
    struct StalledStore;

    #[async_trait]
    impl EnrollmentStore for StalledStore {
        async fn insert_enrollment_and_payment(
            &self,
            _commit: NewEnrollment,
        ) -> Result<CommitResult, DomainError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(DomainError::database("unreachable"))
        }

        async fn get_enrollment_count(&self, _item_id: &ItemId) -> Result<u32, DomainError> {
            Ok(0)
        }

        async fn get_existing_enrollment(
            &self,
            _payer_id: &UserId,
            _item_id: &ItemId,
        ) -> Result<Option<Enrollment>, DomainError> {
            Ok(None)
        }

        async fn find_by_payment_ref(
            &self,
            _payment_ref: &PaymentRef,
        ) -> Result<Option<Enrollment>, DomainError> {
            Ok(None)
        }

        async fn list_payment_records(&self, _item_id: &ItemId) -> Result<Vec<PaymentRecord>, DomainError> {
            Ok(vec![])
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn event(capacity: u32) -> EnrollableItem {
        EnrollableItem::event(
            ItemId::new(),
            ItemId::new(),
            "Workshop",
            Money::from_cents(1000).unwrap(),
            Some(capacity),
        )
        .unwrap()
    }

    fn paid(payer: &str, item: &EnrollableItem, intent: &str) -> CommitEnrollmentCommand {
        CommitEnrollmentCommand {
            payer_id: UserId::new(payer).unwrap(),
            item: item.clone(),
            amount: item.fee,
            payment_ref: PaymentRef::Intent(IntentId::new(intent)),
        }
    }

    fn committer(
        store: &InMemoryEnrollmentStore,
        log: &InMemoryReconciliationLog,
    ) -> EnrollmentCommitter {
        EnrollmentCommitter::new(
            Arc::new(store.clone()),
            Arc::new(log.clone()),
            Duration::from_secs(5),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn commit_writes_enrollment_and_payment_record() {
        let store = InMemoryEnrollmentStore::new();
        let log = InMemoryReconciliationLog::new();
        let item = event(10);

        let outcome = committer(&store, &log)
            .handle(paid("m-1", &item, "pi_1"))
            .await
            .unwrap();

        assert!(outcome.newly_created);
        assert_eq!(store.get_enrollment_count(&item.id).await.unwrap(), 1);
        let records = store.list_payment_records(&item.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, item.fee);
    }

    #[tokio::test]
    async fn same_payment_ref_commits_once() {
        let store = InMemoryEnrollmentStore::new();
        let log = InMemoryReconciliationLog::new();
        let item = event(10);
        let committer = committer(&store, &log);

        let first = committer.handle(paid("m-1", &item, "pi_1")).await.unwrap();
        let second = committer.handle(paid("m-1", &item, "pi_1")).await.unwrap();

        assert_eq!(first.enrollment.id, second.enrollment.id);
        assert!(!second.newly_created);
        assert_eq!(store.get_enrollment_count(&item.id).await.unwrap(), 1);
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_charge_for_enrolled_payer_is_reconciled() {
        let store = InMemoryEnrollmentStore::new();
        let log = InMemoryReconciliationLog::new();
        let item = event(10);
        let committer = committer(&store, &log);

        let first = committer.handle(paid("m-1", &item, "pi_1")).await.unwrap();
        let second = committer.handle(paid("m-1", &item, "pi_2")).await.unwrap();

        assert_eq!(first.enrollment.id, second.enrollment.id);
        assert_eq!(
            log.entries_of_kind(ReconciliationKind::DuplicateCharge)
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn full_item_is_capacity_exceeded() {
        let store = InMemoryEnrollmentStore::new();
        let log = InMemoryReconciliationLog::new();
        let item = event(1);
        let committer = committer(&store, &log);

        committer.handle(paid("m-1", &item, "pi_1")).await.unwrap();
        let err = committer.handle(paid("m-2", &item, "pi_2")).await.unwrap_err();

        assert_eq!(
            err,
            EnrollmentError::CapacityExceeded {
                item_id: item.id,
                capacity: 1
            }
        );
        assert_eq!(store.get_enrollment_count(&item.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_retryable_persistence_error() {
        let store = InMemoryEnrollmentStore::new();
        store.fail_next_commits(1);
        let log = InMemoryReconciliationLog::new();
        let item = event(10);

        let err = committer(&store, &log)
            .handle(paid("m-1", &item, "pi_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollmentError::PersistenceFailure { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn timeout_is_ambiguous_and_reconciled() {
        let log = InMemoryReconciliationLog::new();
        let committer = EnrollmentCommitter::new(
            Arc::new(StalledStore),
            Arc::new(log.clone()),
            Duration::from_millis(50),
        );
        let item = event(10);

        let err = committer.handle(paid("m-1", &item, "pi_1")).await.unwrap_err();

        assert_eq!(err, EnrollmentError::ambiguous_commit("pi_1"));
        let entries = log.entries_of_kind(ReconciliationKind::AmbiguousCommit).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payment_ref.as_str(), "pi_1");
    }

    #[tokio::test]
    async fn free_commits_are_never_reconciled() {
        let store = InMemoryEnrollmentStore::new();
        let log = InMemoryReconciliationLog::new();
        let club = EnrollableItem::club(ItemId::new(), "Chess", Money::ZERO);
        let payer = UserId::new("m-1").unwrap();
        let cmd = CommitEnrollmentCommand {
            payer_id: payer.clone(),
            item: club.clone(),
            amount: Money::ZERO,
            payment_ref: PaymentRef::free(&payer, &club.id, Timestamp::now(), 60),
        };

        let committer = committer(&store, &log);
        committer
            .reconcile(ReconciliationKind::AmbiguousCommit, &cmd, "test".to_string())
            .await;

        assert!(log.entries().await.unwrap().is_empty());
    }
}
