//! Intent registry port.
//!
//! Maps a client idempotency key to the intent created for it, so a retried
//! or double-clicked request reuses the same intent instead of opening a
//! second one.

use async_trait::async_trait;

use crate::domain::enrollment::IntentHandle;
use crate::domain::foundation::{DomainError, IdempotencyKey};

#[async_trait]
pub trait IntentRegistry: Send + Sync {
    /// Intent recorded for the key, if any.
    async fn find(&self, key: &IdempotencyKey) -> Result<Option<IntentHandle>, DomainError>;

    /// Record an intent for the key unless one is already recorded.
    ///
    /// Returns the handle that ends up registered: the given one, or the
    /// one a concurrent caller recorded first.
    async fn record(
        &self,
        key: &IdempotencyKey,
        handle: IntentHandle,
    ) -> Result<IntentHandle, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_registry_is_object_safe() {
        fn _accepts_dyn(_registry: &dyn IntentRegistry) {}
    }
}
