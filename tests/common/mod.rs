//! Shared fixture for enrollment integration tests.
//!
//! Wires the orchestrator to in-memory adapters and the mock gateway, the
//! same way the development binary does without a database or Stripe key.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use club_enrollment::adapters::events::InMemoryEventBus;
use club_enrollment::adapters::gateway::MockPaymentGateway;
use club_enrollment::adapters::memory::{
    InMemoryEnrollmentStore, InMemoryIntentRegistry, InMemoryItemCatalog,
    InMemoryReconciliationLog,
};
use club_enrollment::application::handlers::enrollment::{
    ConfirmationHandler, EnrollmentCommitter, EnrollmentOrchestrator, EnrollmentSession,
    IntentServiceClient, NotificationHook, OrchestratorConfig,
};
use club_enrollment::domain::enrollment::{
    ClientSecret, EnrollableItem, EnrollmentRequest, EnrollmentStatus, PaymentDetails,
};
use club_enrollment::domain::foundation::{IdempotencyKey, ItemId, Money, UserId};
use club_enrollment::ports::PaymentGateway;

pub struct Harness {
    pub gateway: MockPaymentGateway,
    pub store: InMemoryEnrollmentStore,
    pub catalog: InMemoryItemCatalog,
    pub reconciliation: InMemoryReconciliationLog,
    pub bus: Arc<InMemoryEventBus>,
    pub orchestrator: Arc<EnrollmentOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        let gateway = MockPaymentGateway::new();
        Self::with_gateway(gateway.clone(), Arc::new(gateway))
    }

    /// Routes gateway traffic through `gateway` while keeping `mock` for assertions.
    pub fn with_gateway(mock: MockPaymentGateway, gateway: Arc<dyn PaymentGateway>) -> Self {
        let store = InMemoryEnrollmentStore::new();
        let catalog = InMemoryItemCatalog::new();
        let reconciliation = InMemoryReconciliationLog::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let timeout = Duration::from_secs(5);

        let orchestrator = Arc::new(EnrollmentOrchestrator::new(
            Arc::new(catalog.clone()),
            IntentServiceClient::new(
                gateway.clone(),
                Arc::new(InMemoryIntentRegistry::new()),
                "usd",
                timeout,
            ),
            ConfirmationHandler::new(gateway, timeout),
            EnrollmentCommitter::new(
                Arc::new(store.clone()),
                Arc::new(reconciliation.clone()),
                timeout,
            ),
            NotificationHook::new(bus.clone()),
            OrchestratorConfig {
                retry_backoff: Duration::from_millis(1),
                ..OrchestratorConfig::default()
            },
        ));

        Self {
            gateway: mock,
            store,
            catalog,
            reconciliation,
            bus,
            orchestrator,
        }
    }

    pub fn committer(&self) -> EnrollmentCommitter {
        EnrollmentCommitter::new(
            Arc::new(self.store.clone()),
            Arc::new(self.reconciliation.clone()),
            Duration::from_secs(5),
        )
    }

    pub async fn club(&self, cents: i64) -> EnrollableItem {
        let club = EnrollableItem::club(ItemId::new(), "Chess Club", money(cents));
        self.catalog.insert(club.clone()).await;
        club
    }

    pub async fn event(&self, cents: i64, capacity: Option<u32>) -> EnrollableItem {
        let event = EnrollableItem::event(
            ItemId::new(),
            ItemId::new(),
            "Spring Tournament",
            money(cents),
            capacity,
        )
        .unwrap();
        self.catalog.insert(event.clone()).await;
        event
    }
}

pub fn money(cents: i64) -> Money {
    Money::from_cents(cents).unwrap()
}

pub fn payer(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn request(payer_id: &str, item: &EnrollableItem) -> EnrollmentRequest {
    EnrollmentRequest::new(
        payer(payer_id),
        item.id,
        item.kind,
        IdempotencyKey::generate(),
    )
}

pub fn card() -> PaymentDetails {
    PaymentDetails::new("pm_card_visa")
}

/// Reads statuses until the session asks for payment details.
pub async fn awaiting_details(session: &mut EnrollmentSession) -> ClientSecret {
    loop {
        match session.next_status().await {
            Some(EnrollmentStatus::AwaitingPaymentDetails { client_secret }) => {
                return client_secret
            }
            Some(status) if !status.is_terminal() => continue,
            other => panic!("expected AwaitingPaymentDetails, got {:?}", other),
        }
    }
}

/// Polls until `check` holds or one second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
