//! Forkful storefront - food ordering API.
//!
//! This binary serves the storefront API on port 4000.
//!
//! # Architecture
//!
//! - Axum JSON API with bearer-token authentication
//! - `PostgreSQL` for menu, carts and orders
//! - Razorpay (or the local sandbox) for payment intents and callbacks

use std::sync::Arc;

use forkful_core::ports::PaymentGateway;
use forkful_storefront::config::{GatewayKind, StorefrontConfig};
use forkful_storefront::db::{self, PgCartStore, PgCatalog, PgOrderLedger};
use forkful_storefront::payment::{RazorpayGateway, SandboxGateway};
use forkful_storefront::services::JwtVerifier;
use forkful_storefront::state::{AppState, Components};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry
                .environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() {
    let _ = dotenvy::dotenv();

    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "forkful_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p forkful-cli -- migrate

    let gateway: Arc<dyn PaymentGateway> = match config.payment.gateway {
        GatewayKind::Razorpay => Arc::new(
            RazorpayGateway::new(&config.payment).expect("Failed to build Razorpay client"),
        ),
        GatewayKind::Sandbox => {
            tracing::warn!("Using the sandbox payment gateway; no real payments are taken");
            Arc::new(SandboxGateway::new(
                config.payment.key_id.clone(),
                config.payment.key_secret.clone(),
            ))
        }
    };

    let state = AppState::new(Components {
        carts: Arc::new(PgCartStore::new(pool.clone())),
        catalog: Arc::new(PgCatalog::new(pool.clone())),
        ledger: Arc::new(PgOrderLedger::new(pool)),
        gateway,
        verifier: Arc::new(JwtVerifier::new(&config.token)),
        commerce: config.commerce,
        gateway_timeout: config.payment.timeout,
    });

    let app = forkful_storefront::app(state);

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
