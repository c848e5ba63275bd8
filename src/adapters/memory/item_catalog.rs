//! In-memory item catalog.
//!
//! Stands in for the club/event catalog service in development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::enrollment::EnrollableItem;
use crate::domain::foundation::{DomainError, ItemId};
use crate::ports::ItemCatalog;

#[derive(Debug, Clone, Default)]
pub struct InMemoryItemCatalog {
    items: Arc<RwLock<HashMap<ItemId, EnrollableItem>>>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item.
    pub async fn insert(&self, item: EnrollableItem) {
        self.items.write().await.insert(item.id, item);
    }

    pub async fn items(&self) -> Vec<EnrollableItem> {
        self.items.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ItemCatalog for InMemoryItemCatalog {
    async fn find_item(&self, id: &ItemId) -> Result<Option<EnrollableItem>, DomainError> {
        Ok(self.items.read().await.get(id).cloned())
    }
}
