//! In-memory intent registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::enrollment::IntentHandle;
use crate::domain::foundation::{DomainError, IdempotencyKey};
use crate::ports::IntentRegistry;

/// Idempotency key to intent mapping held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIntentRegistry {
    intents: Arc<RwLock<HashMap<IdempotencyKey, IntentHandle>>>,
}

impl InMemoryIntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.intents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.intents.read().await.is_empty()
    }
}

#[async_trait]
impl IntentRegistry for InMemoryIntentRegistry {
    async fn find(&self, key: &IdempotencyKey) -> Result<Option<IntentHandle>, DomainError> {
        Ok(self.intents.read().await.get(key).cloned())
    }

    async fn record(
        &self,
        key: &IdempotencyKey,
        handle: IntentHandle,
    ) -> Result<IntentHandle, DomainError> {
        let mut intents = self.intents.write().await;
        Ok(intents.entry(key.clone()).or_insert(handle).clone())
    }
}
