//! Enrollment cache port.
//!
//! Read-side caches (seat counts per item, a payer's enrollment list) that
//! go stale when an enrollment is committed.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ItemId, UserId};

#[async_trait]
pub trait EnrollmentCache: Send + Sync {
    /// Drop cached stats for an item.
    async fn invalidate_item(&self, item_id: &ItemId) -> Result<(), DomainError>;

    /// Drop cached enrollment views for a payer.
    async fn invalidate_payer(&self, payer_id: &UserId) -> Result<(), DomainError>;
}
