//! PostgreSQL implementation of ReconciliationLog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::enrollment::PaymentRef;
use crate::domain::foundation::{DomainError, ErrorCode, ItemId, Money, Timestamp, UserId};
use crate::ports::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};

pub struct PostgresReconciliationLog {
    pool: PgPool,
}

impl PostgresReconciliationLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    kind: String,
    payer_id: String,
    item_id: Uuid,
    amount_cents: i64,
    payment_ref: String,
    detail: String,
    recorded_at: DateTime<Utc>,
}

fn kind_to_str(kind: ReconciliationKind) -> &'static str {
    match kind {
        ReconciliationKind::CapacityExceededAfterCharge => "capacity_exceeded_after_charge",
        ReconciliationKind::AmbiguousCommit => "ambiguous_commit",
        ReconciliationKind::DuplicateCharge => "duplicate_charge",
        ReconciliationKind::CommitFailedAfterCharge => "commit_failed_after_charge",
    }
}

fn parse_kind(s: &str) -> Result<ReconciliationKind, DomainError> {
    match s {
        "capacity_exceeded_after_charge" => Ok(ReconciliationKind::CapacityExceededAfterCharge),
        "ambiguous_commit" => Ok(ReconciliationKind::AmbiguousCommit),
        "duplicate_charge" => Ok(ReconciliationKind::DuplicateCharge),
        "commit_failed_after_charge" => Ok(ReconciliationKind::CommitFailedAfterCharge),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid reconciliation kind: {}", other),
        )),
    }
}

impl TryFrom<EntryRow> for ReconciliationEntry {
    type Error = DomainError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str, e: String| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", field, e))
        };

        Ok(ReconciliationEntry {
            id: row.id,
            kind: parse_kind(&row.kind)?,
            payer_id: UserId::new(row.payer_id).map_err(|e| invalid("payer_id", e.to_string()))?,
            item_id: ItemId::from_uuid(row.item_id),
            amount: Money::from_cents(row.amount_cents)
                .map_err(|e| invalid("amount", e.to_string()))?,
            payment_ref: PaymentRef::try_from(row.payment_ref)
                .map_err(|e| invalid("payment_ref", e))?,
            detail: row.detail,
            recorded_at: Timestamp::from_datetime(row.recorded_at),
        })
    }
}

#[async_trait]
impl ReconciliationLog for PostgresReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_entries (
                id, kind, payer_id, item_id, amount_cents, payment_ref, detail, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(kind_to_str(entry.kind))
        .bind(entry.payer_id.as_str())
        .bind(entry.item_id.as_uuid())
        .bind(entry.amount.cents())
        .bind(entry.payment_ref.as_str())
        .bind(&entry.detail)
        .bind(entry.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record reconciliation entry: {}", e)))?;

        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ReconciliationEntry>, DomainError> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, kind, payer_id, item_id, amount_cents, payment_ref, detail, recorded_at
            FROM reconciliation_entries
            ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list reconciliation entries: {}", e)))?;

        rows.into_iter().map(ReconciliationEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip() {
        for kind in [
            ReconciliationKind::CapacityExceededAfterCharge,
            ReconciliationKind::AmbiguousCommit,
            ReconciliationKind::DuplicateCharge,
            ReconciliationKind::CommitFailedAfterCharge,
        ] {
            assert_eq!(parse_kind(kind_to_str(kind)).unwrap(), kind);
        }
        assert!(parse_kind("refund").is_err());
    }
}
