//! In-memory enrollment cache.
//!
//! Holds seat counts per item and enrollment lists per payer for read
//! endpoints, and counts invalidations so tests can observe them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, EnrollmentId, ItemId, UserId};
use crate::ports::EnrollmentCache;

#[derive(Debug, Default)]
struct CacheState {
    seat_counts: HashMap<ItemId, u32>,
    payer_views: HashMap<UserId, Vec<EnrollmentId>>,
    item_invalidations: HashMap<ItemId, usize>,
    payer_invalidations: HashMap<UserId, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryEnrollmentCache {
    state: Arc<RwLock<CacheState>>,
}

impl InMemoryEnrollmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_seat_count(&self, item_id: ItemId, count: u32) {
        self.state.write().await.seat_counts.insert(item_id, count);
    }

    pub async fn seat_count(&self, item_id: &ItemId) -> Option<u32> {
        self.state.read().await.seat_counts.get(item_id).copied()
    }

    pub async fn put_payer_view(&self, payer_id: UserId, enrollments: Vec<EnrollmentId>) {
        self.state
            .write()
            .await
            .payer_views
            .insert(payer_id, enrollments);
    }

    pub async fn payer_view(&self, payer_id: &UserId) -> Option<Vec<EnrollmentId>> {
        self.state.read().await.payer_views.get(payer_id).cloned()
    }

    pub async fn item_invalidations(&self, item_id: &ItemId) -> usize {
        self.state
            .read()
            .await
            .item_invalidations
            .get(item_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn payer_invalidations(&self, payer_id: &UserId) -> usize {
        self.state
            .read()
            .await
            .payer_invalidations
            .get(payer_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EnrollmentCache for InMemoryEnrollmentCache {
    async fn invalidate_item(&self, item_id: &ItemId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.seat_counts.remove(item_id);
        *state.item_invalidations.entry(*item_id).or_default() += 1;
        Ok(())
    }

    async fn invalidate_payer(&self, payer_id: &UserId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.payer_views.remove(payer_id);
        *state
            .payer_invalidations
            .entry(payer_id.clone())
            .or_default() += 1;
        Ok(())
    }
}
