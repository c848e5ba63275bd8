//! Post-commit notification.
//!
//! Events are published on a detached task after the session outcome is
//! known. A slow or failing subscriber never delays or fails the enrollment.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::enrollment::{
    CapacityExceededAfterCharge, EnrollableItem, Enrollment, EnrollmentCanceled,
    EnrollmentCommitted, PaymentRef,
};
use crate::domain::foundation::{
    DomainError, EventEnvelope, EventId, IdempotencyKey, Money, SerializableDomainEvent,
    Timestamp, UserId,
};
use crate::ports::{EnrollmentCache, EventHandler, EventPublisher};

/// Fire-and-forget publisher for enrollment events.
#[derive(Clone)]
pub struct NotificationHook {
    publisher: Arc<dyn EventPublisher>,
}

impl NotificationHook {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub fn enrollment_committed(
        &self,
        enrollment: &Enrollment,
        amount: Money,
        payment_ref: &PaymentRef,
        correlation: &IdempotencyKey,
    ) -> JoinHandle<()> {
        let event = EnrollmentCommitted {
            event_id: EventId::new(),
            enrollment_id: enrollment.id,
            kind: enrollment.kind,
            payer_id: enrollment.payer_id.clone(),
            item_id: enrollment.item_id,
            amount,
            payment_ref: payment_ref.clone(),
            committed_at: enrollment.enrolled_at,
        };
        self.spawn(event.to_envelope(), correlation, &enrollment.payer_id)
    }

    pub fn capacity_exceeded(
        &self,
        item: &EnrollableItem,
        payer_id: &UserId,
        amount: Money,
        payment_ref: &PaymentRef,
        capacity: u32,
        correlation: &IdempotencyKey,
    ) -> JoinHandle<()> {
        let event = CapacityExceededAfterCharge {
            event_id: EventId::new(),
            item_id: item.id,
            payer_id: payer_id.clone(),
            amount,
            payment_ref: payment_ref.clone(),
            capacity,
            detected_at: Timestamp::now(),
        };
        self.spawn(event.to_envelope(), correlation, payer_id)
    }

    pub fn enrollment_canceled(
        &self,
        item: &EnrollableItem,
        payer_id: &UserId,
        correlation: &IdempotencyKey,
    ) -> JoinHandle<()> {
        let event = EnrollmentCanceled {
            event_id: EventId::new(),
            item_id: item.id,
            item_kind: item.kind,
            payer_id: payer_id.clone(),
            canceled_at: Timestamp::now(),
        };
        self.spawn(event.to_envelope(), correlation, payer_id)
    }

    fn spawn(
        &self,
        envelope: Result<EventEnvelope, DomainError>,
        correlation: &IdempotencyKey,
        payer_id: &UserId,
    ) -> JoinHandle<()> {
        let publisher = self.publisher.clone();
        let envelope = envelope.map(|e| {
            e.with_correlation_id(correlation.as_str())
                .with_user_id(payer_id.as_str())
        });

        tokio::spawn(async move {
            let envelope = match envelope {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "Failed to build enrollment event");
                    return;
                }
            };
            let event_type = envelope.event_type.clone();
            match publisher.publish(envelope).await {
                Ok(()) => debug!(event_type = %event_type, "Enrollment event published"),
                Err(err) => warn!(
                    event_type = %event_type,
                    error = %err,
                    "Failed to publish enrollment event"
                ),
            }
        })
    }
}

/// Drops cached seat counts and payer views when enrollments change.
pub struct CacheInvalidationHandler {
    cache: Arc<dyn EnrollmentCache>,
}

impl CacheInvalidationHandler {
    pub const EVENT_TYPES: [&'static str; 2] =
        ["enrollment.committed.v1", "enrollment.capacity_exceeded.v1"];

    pub fn new(cache: Arc<dyn EnrollmentCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventHandler for CacheInvalidationHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        match event.event_type.as_str() {
            "enrollment.committed.v1" => {
                let committed: EnrollmentCommitted = event.payload_as().map_err(|e| {
                    DomainError::validation("payload", format!("Invalid committed event: {}", e))
                })?;
                self.cache.invalidate_item(&committed.item_id).await?;
                self.cache.invalidate_payer(&committed.payer_id).await?;
            }
            "enrollment.capacity_exceeded.v1" => {
                let exceeded: CapacityExceededAfterCharge = event.payload_as().map_err(|e| {
                    DomainError::validation("payload", format!("Invalid capacity event: {}", e))
                })?;
                self.cache.invalidate_item(&exceeded.item_id).await?;
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CacheInvalidationHandler"
    }
}
