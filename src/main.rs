//! Server entry-point: loads configuration, wires adapters and serves the
//! enrollment API.
//!
//! Items come from an in-memory catalog seeded with demo data, and intent
//! reuse is tracked in memory. Club and event management live outside this
//! crate, so the binary refuses to start in production until a real
//! `ItemCatalog` is wired in.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use club_enrollment::adapters::events::InMemoryEventBus;
use club_enrollment::adapters::gateway::{
    MockPaymentGateway, StripeGatewayConfig, StripePaymentGateway,
};
use club_enrollment::adapters::http::enrollment::SessionRegistry;
use club_enrollment::adapters::http::{enrollment_router, EnrollmentAppState};
use club_enrollment::adapters::memory::{
    InMemoryEnrollmentCache, InMemoryEnrollmentStore, InMemoryIntentRegistry,
    InMemoryItemCatalog, InMemoryReconciliationLog,
};
use club_enrollment::adapters::postgres::{PostgresEnrollmentStore, PostgresReconciliationLog};
use club_enrollment::application::handlers::enrollment::{
    CacheInvalidationHandler, ConfirmationHandler, EnrollmentCommitter, EnrollmentOrchestrator,
    IntentServiceClient, NotificationHook,
};
use club_enrollment::config::{AppConfig, DatabaseConfig, PaymentConfig, ServerConfig};
use club_enrollment::domain::enrollment::EnrollableItem;
use club_enrollment::domain::foundation::{ItemId, Money};
use club_enrollment::ports::{EnrollmentStore, EventSubscriber, PaymentGateway, ReconciliationLog};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;
    ensure_demo_wiring(&config)?;

    let bus = Arc::new(InMemoryEventBus::new());
    bus.subscribe_all(
        &CacheInvalidationHandler::EVENT_TYPES,
        Arc::new(CacheInvalidationHandler::new(Arc::new(
            InMemoryEnrollmentCache::new(),
        ))),
    );

    let (store, reconciliation) = storage(&config.database).await?;
    let gateway = gateway(&config.payment)?;
    let catalog = InMemoryItemCatalog::new();
    seed_demo_items(&catalog).await?;

    let enrollment = &config.enrollment;
    let orchestrator = Arc::new(EnrollmentOrchestrator::new(
        Arc::new(catalog),
        IntentServiceClient::new(
            gateway.clone(),
            Arc::new(InMemoryIntentRegistry::new()),
            config.payment.currency.clone(),
            enrollment.gateway_timeout(),
        ),
        ConfirmationHandler::new(gateway, enrollment.gateway_timeout()).with_processing_poll(
            enrollment.processing_poll(),
            enrollment.processing_poll_attempts,
        ),
        EnrollmentCommitter::new(store, reconciliation, enrollment.commit_timeout()),
        NotificationHook::new(bus),
        enrollment.orchestrator_config(),
    ));

    let state = EnrollmentAppState::with_registry(
        orchestrator,
        SessionRegistry::with_claim_timeout(enrollment.stream_claim_timeout()),
    );
    let app = build_app(&config.server, state);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = ?config.server.environment, "Enrollment server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// The in-memory catalog and intent registry are only fit for demo data.
fn ensure_demo_wiring(config: &AppConfig) -> Result<(), BoxError> {
    if config.is_production() {
        return Err(
            "no production item catalog is wired in; this binary serves demo data only".into(),
        );
    }
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));

    let result = if server.json_logs {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        warn!(error = %e, "tracing init failed");
    }
}

async fn storage(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn EnrollmentStore>, Arc<dyn ReconciliationLog>), BoxError> {
    if !database.is_configured() {
        warn!("No database configured, enrollments are kept in memory");
        return Ok((
            Arc::new(InMemoryEnrollmentStore::new()),
            Arc::new(InMemoryReconciliationLog::new()),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    Ok((
        Arc::new(PostgresEnrollmentStore::new(pool.clone())),
        Arc::new(PostgresReconciliationLog::new(pool)),
    ))
}

fn gateway(payment: &PaymentConfig) -> Result<Arc<dyn PaymentGateway>, BoxError> {
    match &payment.stripe_api_key {
        Some(key) => {
            let config = StripeGatewayConfig::new(key.clone())
                .with_base_url(payment.api_base_url.clone())
                .with_request_timeout(payment.request_timeout());
            info!(test_mode = payment.is_test_mode(), "Using Stripe payment gateway");
            Ok(Arc::new(StripePaymentGateway::new(config)?))
        }
        None => {
            warn!("No Stripe key configured, payments go to the mock gateway");
            Ok(Arc::new(MockPaymentGateway::new()))
        }
    }
}

async fn seed_demo_items(catalog: &InMemoryItemCatalog) -> Result<(), BoxError> {
    let club = EnrollableItem::club(ItemId::new(), "Chess Club", Money::ZERO);
    let event = EnrollableItem::event(
        ItemId::new(),
        club.id,
        "Spring Tournament",
        Money::from_cents(1000)?,
        Some(20),
    )?;

    info!(club_id = %club.id, event_id = %event.id, "Seeded demo club and event");
    catalog.insert(club).await;
    catalog.insert(event).await;
    Ok(())
}

fn build_app(server: &ServerConfig, state: EnrollmentAppState) -> Router {
    let origin = server
        .checkout_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok());
    let cors = match origin {
        Some(origin) => CorsLayer::new().allow_origin(origin),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    // The timeout bounds time-to-headers; SSE bodies keep streaming past it.
    enrollment_router()
        .with_state(state)
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
