//! Router configuration for the leadmarket server.
//!
//! Builds the complete Axum router with all endpoints.

use crate::api::{health, leads, webhooks};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Configures all routes:
/// - Health checks
/// - Lead purchase and snapshot endpoints under `/api`
/// - The payment gateway webhook under `/webhooks`
///
/// The webhook route carries a permissive CORS layer (the gateway posts
/// from its own origin); unsupported methods are rejected by the method
/// routing itself.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/leads/:id", get(leads::get_lead))
        .route("/leads/:id/purchase", post(leads::purchase_lead));

    let webhook_routes = Router::new()
        .route("/payments", post(webhooks::payment_webhook))
        .layer(CorsLayer::permissive());

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes)
        .nest("/webhooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
