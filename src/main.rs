//! Storefront Core API
//!
//! Backend API for an e-commerce storefront: catalog, cart, checkout and
//! order lifecycle, built on event sourcing and CQRS read-model
//! projections (SPEC_FULL §1-§3).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod aggregate;
pub mod api;
pub mod cart;
mod config;
mod db;
pub mod domain;
pub mod email;
mod error;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod payment;
pub mod projection;
pub mod storage;
pub mod token;

use api::routes::AppState;
use email::{EmailQueue, MockEmailService};
use event_store::EventStore;
use payment::{MockPaymentGateway, PaymentGateway};
use projection::ProjectionService;
use storage::{ImageRepository, MockImageRepository};
use token::TokenService;

pub use config::Config;
pub use error::{AppError, AppResult};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("starting storefront core server");
    tracing::info!("connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("database schema incomplete"));
    }

    tracing::info!("database connected successfully");

    let event_store = EventStore::new(pool.clone());
    let projection = ProjectionService::new(pool.clone());
    let cart_registry = cart::CartRegistry::new(projection.clone());
    let token_service = TokenService::new(pool.clone(), config.jwt_secret.clone());

    let email_service: Arc<dyn email::EmailService> = Arc::new(MockEmailService);
    let email_queue = EmailQueue::new(pool.clone(), email_service);

    let payment_gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway);
    let image_repository: Arc<dyn ImageRepository> = Arc::new(MockImageRepository::new(config.static_asset_base_url.clone()));

    let app_state = AppState {
        event_store,
        projection,
        cart_registry: cart_registry.clone(),
        email_queue: email_queue.clone(),
        payment_gateway,
        image_repository,
        token_service,
        config: config.clone(),
    };

    let scheduler = jobs::JobScheduler::new(pool.clone(), cart_registry, email_queue);
    let scheduler_handle = scheduler.start();

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::create_router(app_state))
        .layer(TraceLayer::new_for_http());

    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutting down...");
    scheduler_handle.abort();
    pool.close().await;
    tracing::info!("database connections closed. goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown...");
        },
    }
}
