//! Leadmarket Server
//!
//! Main server process for the lead allocation engine.
//!
//! This binary:
//! - Initializes tracing and loads configuration from the environment
//! - Wires the allocation engine over the in-memory lead store
//! - Serves the purchase API and the payment gateway webhook
//!
//! # Usage
//!
//! ```bash
//! GATEWAY_WEBHOOK_SECRET=whsec_... cargo run --bin leadmarket-web
//! ```

use chrono::Duration;
use leadmarket_core::store::memory::MemoryLeadStore;
use leadmarket_core::{Clock, HmacSha256Verifier, LeadStore, SystemClock, WebhookVerifier};
use leadmarket_web::{build_router, AppState, Config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadmarket_web=debug,leadmarket_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // Wire the engine. The in-memory store serves development; a deployment
    // substitutes its document-store adapter behind the same trait.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn LeadStore> = Arc::new(MemoryLeadStore::new());
    let tolerance = i64::try_from(config.gateway.signature_tolerance).unwrap_or(300);
    let verifier: Arc<dyn WebhookVerifier> = Arc::new(HmacSha256Verifier::new(
        config.gateway.webhook_secret.clone(),
        Duration::seconds(tolerance),
        clock.clone(),
    ));
    let state = AppState::new(store, clock, verifier);

    let router = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Leadmarket server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => tracing::error!(%error, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
