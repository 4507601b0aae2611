//! Application state for the leadmarket HTTP server.
//!
//! Contains the shared resources handlers need: the lead store for reads
//! and the two engine orchestrators for writes. Mutations go exclusively
//! through the orchestrators; handlers never write the store directly.

use leadmarket_core::{
    Clock, LeadStore, PurchaseCoordinator, WebhookReconciler, WebhookVerifier,
};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Lead store for read-only snapshots
    pub store: Arc<dyn LeadStore>,

    /// Orchestrator for client-initiated purchases
    pub coordinator: Arc<PurchaseCoordinator>,

    /// Orchestrator for gateway-confirmed purchases
    pub reconciler: Arc<WebhookReconciler>,
}

impl AppState {
    /// Wire the engine over the given store, clock and webhook verifier.
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn WebhookVerifier>,
    ) -> Self {
        let coordinator = Arc::new(PurchaseCoordinator::new(store.clone(), clock.clone()));
        let reconciler = Arc::new(WebhookReconciler::new(store.clone(), clock, verifier));
        Self {
            store,
            coordinator,
            reconciler,
        }
    }
}
