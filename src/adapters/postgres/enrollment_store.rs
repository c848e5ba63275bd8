//! PostgreSQL implementation of EnrollmentStore.
//!
//! One transaction per commit. The item's counter row is locked with
//! `SELECT ... FOR UPDATE`, which serializes commits for that item only.
//! Unique constraints on `payment_ref` and on the active (payer, item) pair
//! back up the checks made under the lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::enrollment::{
    Enrollment, EnrollmentKind, EnrollmentState, PaymentRecord, PaymentRecordStatus, PaymentRef,
    PaymentType,
};
use crate::domain::foundation::{
    DomainError, EnrollmentId, ErrorCode, ItemId, Money, PaymentRecordId, Timestamp, UserId,
};
use crate::ports::{CommitResult, EnrollmentStore, NewEnrollment};

/// PostgreSQL implementation of the EnrollmentStore port.
pub struct PostgresEnrollmentStore {
    pool: PgPool,
}

impl PostgresEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an enrollment.
#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    kind: String,
    payer_id: String,
    item_id: Uuid,
    state: String,
    enrolled_at: DateTime<Utc>,
    payment_ref: String,
}

impl EnrollmentRow {
    fn into_parts(self) -> Result<(Enrollment, PaymentRef), DomainError> {
        let kind: EnrollmentKind = self.kind.parse().map_err(corrupt)?;
        let state: EnrollmentState = self.state.parse().map_err(corrupt)?;
        let payer_id = UserId::new(self.payer_id).map_err(|e| corrupt(e.to_string()))?;
        let payment_ref = PaymentRef::try_from(self.payment_ref).map_err(corrupt)?;

        let enrollment = Enrollment {
            id: EnrollmentId::from_uuid(self.id),
            kind,
            payer_id,
            item_id: ItemId::from_uuid(self.item_id),
            state,
            enrolled_at: Timestamp::from_datetime(self.enrolled_at),
        };
        Ok((enrollment, payment_ref))
    }
}

/// Database row representation of a payment record.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRecordRow {
    id: Uuid,
    payer_id: String,
    payment_type: String,
    item_id: Uuid,
    amount_cents: i64,
    payment_ref: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRecordRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRecordRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            id: PaymentRecordId::from_uuid(row.id),
            payer_id: UserId::new(row.payer_id).map_err(|e| corrupt(e.to_string()))?,
            payment_type: row.payment_type.parse::<PaymentType>().map_err(corrupt)?,
            item_id: ItemId::from_uuid(row.item_id),
            amount: Money::from_cents(row.amount_cents).map_err(|e| corrupt(e.to_string()))?,
            status: PaymentRecordStatus::Completed,
            payment_ref: PaymentRef::try_from(row.payment_ref).map_err(corrupt)?,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn corrupt(message: String) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored value: {}", message))
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

const ENROLLMENT_COLUMNS: &str =
    "id, kind, payer_id, item_id, state, enrolled_at, payment_ref";

async fn enrollment_by_ref(
    tx: &mut Transaction<'_, Postgres>,
    payment_ref: &PaymentRef,
) -> Result<Option<Enrollment>, DomainError> {
    let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
        "SELECT {} FROM enrollments WHERE payment_ref = $1",
        ENROLLMENT_COLUMNS
    ))
    .bind(payment_ref.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to look up payment reference", e))?;

    row.map(|r| r.into_parts().map(|(enrollment, _)| enrollment))
        .transpose()
}

async fn active_for_pair(
    tx: &mut Transaction<'_, Postgres>,
    payer_id: &UserId,
    item_id: &ItemId,
) -> Result<Option<(Enrollment, PaymentRef)>, DomainError> {
    let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
        "SELECT {} FROM enrollments WHERE payer_id = $1 AND item_id = $2 AND state = 'active'",
        ENROLLMENT_COLUMNS
    ))
    .bind(payer_id.as_str())
    .bind(item_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to look up enrollment", e))?;

    row.map(EnrollmentRow::into_parts).transpose()
}

#[async_trait]
impl EnrollmentStore for PostgresEnrollmentStore {
    async fn insert_enrollment_and_payment(
        &self,
        commit: NewEnrollment,
    ) -> Result<CommitResult, DomainError> {
        let NewEnrollment {
            enrollment,
            payment_record,
            capacity,
        } = commit;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        sqlx::query(
            "INSERT INTO item_enrollment_counters (item_id) VALUES ($1) ON CONFLICT (item_id) DO NOTHING",
        )
        .bind(enrollment.item_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to initialize counter", e))?;

        let enrolled: i32 = sqlx::query_scalar(
            "SELECT enrollment_count FROM item_enrollment_counters WHERE item_id = $1 FOR UPDATE",
        )
        .bind(enrollment.item_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to lock counter", e))?;
        let enrolled = u32::try_from(enrolled).unwrap_or(0);

        if let Some(existing) = enrollment_by_ref(&mut tx, &payment_record.payment_ref).await? {
            return Ok(CommitResult::ExistingForRef {
                enrollment: existing,
            });
        }

        if let Some((existing, existing_ref)) =
            active_for_pair(&mut tx, &enrollment.payer_id, &enrollment.item_id).await?
        {
            return Ok(CommitResult::AlreadyEnrolled {
                enrollment: existing,
                existing_ref: Some(existing_ref),
            });
        }

        if let Some(capacity) = capacity {
            if enrolled >= capacity {
                return Ok(CommitResult::CapacityExceeded { capacity, enrolled });
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (id, kind, payer_id, item_id, state, enrolled_at, payment_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(enrollment.id.as_uuid())
        .bind(enrollment.kind.as_str())
        .bind(enrollment.payer_id.as_str())
        .bind(enrollment.item_id.as_uuid())
        .bind(enrollment.state.as_str())
        .bind(enrollment.enrolled_at.as_datetime())
        .bind(payment_record.payment_ref.as_str())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                // Lost a race on a constraint the lock does not cover; the
                // winner's row is visible once this transaction is gone.
                drop(tx);
                return self.resolve_conflict(&enrollment, &payment_record.payment_ref).await;
            }
            return Err(db_error("Failed to insert enrollment", e));
        }

        sqlx::query(
            r#"
            INSERT INTO payment_records (
                id, payer_id, payment_type, item_id, amount_cents, status, payment_ref, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment_record.id.as_uuid())
        .bind(payment_record.payer_id.as_str())
        .bind(payment_record.payment_type.as_str())
        .bind(payment_record.item_id.as_uuid())
        .bind(payment_record.amount.cents())
        .bind(payment_record.status.as_str())
        .bind(payment_record.payment_ref.as_str())
        .bind(payment_record.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert payment record", e))?;

        sqlx::query(
            "UPDATE item_enrollment_counters SET enrollment_count = enrollment_count + 1 WHERE item_id = $1",
        )
        .bind(enrollment.item_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to increment counter", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        Ok(CommitResult::Inserted {
            enrollment,
            payment_record,
        })
    }

    async fn get_enrollment_count(&self, item_id: &ItemId) -> Result<u32, DomainError> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT enrollment_count FROM item_enrollment_counters WHERE item_id = $1",
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read enrollment count", e))?;

        Ok(count.and_then(|c| u32::try_from(c).ok()).unwrap_or(0))
    }

    async fn get_existing_enrollment(
        &self,
        payer_id: &UserId,
        item_id: &ItemId,
    ) -> Result<Option<Enrollment>, DomainError> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM enrollments WHERE payer_id = $1 AND item_id = $2 AND state = 'active'",
            ENROLLMENT_COLUMNS
        ))
        .bind(payer_id.as_str())
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to look up enrollment", e))?;

        row.map(|r| r.into_parts().map(|(enrollment, _)| enrollment))
            .transpose()
    }

    async fn find_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Enrollment>, DomainError> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM enrollments WHERE payment_ref = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(payment_ref.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to look up payment reference", e))?;

        row.map(|r| r.into_parts().map(|(enrollment, _)| enrollment))
            .transpose()
    }

    async fn list_payment_records(
        &self,
        item_id: &ItemId,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let rows: Vec<PaymentRecordRow> = sqlx::query_as(
            r#"
            SELECT id, payer_id, payment_type, item_id, amount_cents, payment_ref, created_at
            FROM payment_records
            WHERE item_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list payment records", e))?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }
}

impl PostgresEnrollmentStore {
    async fn resolve_conflict(
        &self,
        enrollment: &Enrollment,
        payment_ref: &PaymentRef,
    ) -> Result<CommitResult, DomainError> {
        if let Some(existing) = self.find_by_payment_ref(payment_ref).await? {
            return Ok(CommitResult::ExistingForRef {
                enrollment: existing,
            });
        }

        match self
            .get_existing_enrollment(&enrollment.payer_id, &enrollment.item_id)
            .await?
        {
            Some(existing) => Ok(CommitResult::AlreadyEnrolled {
                enrollment: existing,
                existing_ref: None,
            }),
            None => Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Unique constraint violated but no conflicting enrollment found",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::IntentId;

    fn enrollment_row(kind: &str, state: &str, payment_ref: &str) -> EnrollmentRow {
        EnrollmentRow {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            payer_id: "member-1".to_string(),
            item_id: Uuid::new_v4(),
            state: state.to_string(),
            enrolled_at: Utc::now(),
            payment_ref: payment_ref.to_string(),
        }
    }

    fn payment_row(payment_type: &str, amount_cents: i64, payment_ref: &str) -> PaymentRecordRow {
        PaymentRecordRow {
            id: Uuid::new_v4(),
            payer_id: "member-1".to_string(),
            payment_type: payment_type.to_string(),
            item_id: Uuid::new_v4(),
            amount_cents,
            payment_ref: payment_ref.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn enrollment_row_converts_to_domain() {
        let row = enrollment_row("registration", "active", "pi_123");
        let id = row.id;
        let item_id = row.item_id;

        let (enrollment, payment_ref) = row.into_parts().unwrap();

        assert_eq!(enrollment.id, EnrollmentId::from_uuid(id));
        assert_eq!(enrollment.item_id, ItemId::from_uuid(item_id));
        assert_eq!(enrollment.kind, EnrollmentKind::Registration);
        assert_eq!(enrollment.state, EnrollmentState::Active);
        assert_eq!(enrollment.payer_id.as_str(), "member-1");
        assert_eq!(payment_ref, PaymentRef::Intent(IntentId::new("pi_123")));
    }

    #[test]
    fn stored_strings_match_domain_names() {
        for kind in [EnrollmentKind::Membership, EnrollmentKind::Registration] {
            for state in [EnrollmentState::Active, EnrollmentState::Inactive] {
                let row = enrollment_row(kind.as_str(), state.as_str(), "pi_1");
                let (enrollment, _) = row.into_parts().unwrap();
                assert_eq!(enrollment.kind, kind);
                assert_eq!(enrollment.state, state);
            }
        }
    }

    #[test]
    fn free_payment_ref_survives_the_column() {
        let free = PaymentRef::free(
            &UserId::new("member-1").unwrap(),
            &ItemId::new(),
            Timestamp::now(),
            60,
        );
        let row = enrollment_row("membership", "active", free.as_str());

        let (_, payment_ref) = row.into_parts().unwrap();

        assert!(payment_ref.is_free());
        assert_eq!(payment_ref, free);
    }

    #[test]
    fn unknown_kind_is_reported_as_corrupt() {
        let err = enrollment_row("season_pass", "active", "pi_1")
            .into_parts()
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.starts_with("Invalid stored value"));
    }

    #[test]
    fn unknown_state_is_reported_as_corrupt() {
        let err = enrollment_row("membership", "paused", "pi_1")
            .into_parts()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn empty_payment_ref_is_reported_as_corrupt() {
        let err = enrollment_row("membership", "active", "")
            .into_parts()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn payment_record_row_converts_to_domain() {
        let row = payment_row("event", 2500, "pi_456");
        let id = row.id;

        let record = PaymentRecord::try_from(row).unwrap();

        assert_eq!(record.id, PaymentRecordId::from_uuid(id));
        assert_eq!(record.payment_type, PaymentType::Event);
        assert_eq!(record.amount, Money::from_cents(2500).unwrap());
        assert_eq!(record.status, PaymentRecordStatus::Completed);
        assert_eq!(record.payment_ref.as_str(), "pi_456");
    }

    #[test]
    fn negative_stored_amount_is_reported_as_corrupt() {
        let err = PaymentRecord::try_from(payment_row("event", -1, "pi_1")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn unknown_payment_type_is_reported_as_corrupt() {
        let err = PaymentRecord::try_from(payment_row("donation", 100, "pi_1")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn blank_payer_is_reported_as_corrupt() {
        let mut row = payment_row("membership", 0, "free_abc");
        row.payer_id = "  ".to_string();
        let err = PaymentRecord::try_from(row).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
