//! Item catalog port.
//!
//! Read-only view onto the club/event catalog, which lives outside this
//! crate. The enrollment transaction only needs fee, kind and capacity.

use async_trait::async_trait;

use crate::domain::enrollment::EnrollableItem;
use crate::domain::foundation::{DomainError, ItemId};

#[async_trait]
pub trait ItemCatalog: Send + Sync {
    /// Find a club or event by id.
    ///
    /// Returns `None` if not found.
    async fn find_item(&self, id: &ItemId) -> Result<Option<EnrollableItem>, DomainError>;
}
