//! Payment gateway webhook endpoint.
//!
//! `POST /webhooks/payments` receives signed confirmation events. The
//! gateway delivers at-least-once and keeps retrying anything it does not
//! see acknowledged, which drives the response mapping:
//!
//! - every benign disposition (processed, duplicate, already owned, failed
//!   charge) acks `200` so redelivery stops
//! - signature and payload failures answer `400`
//! - a capacity conflict is acked `200` with a conflict marker; the
//!   engine's error-level log line is the operator's compensation trigger
//!   (redelivering the event cannot free a slot)
//! - store contention answers `409` and lets the gateway redeliver

use crate::error::AppError;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use leadmarket_core::{ReconcileError, ReconcileOutcome};
use serde::Serialize;

/// Header carrying the gateway's `t=...,v1=...` signature.
pub const SIGNATURE_HEADER: &str = "Gateway-Signature";

/// Acknowledgment body returned to the gateway.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always true on acked deliveries
    pub received: bool,
    /// What the engine did with the event
    /// (`processed`, `already_owned`, `duplicate`, `ignored`, `capacity_conflict`)
    pub disposition: String,
}

impl WebhookAck {
    fn new(disposition: &str) -> Self {
        Self {
            received: true,
            disposition: disposition.to_string(),
        }
    }
}

/// Receive one payment confirmation delivery.
///
/// # Errors
///
/// - `400 BAD_REQUEST` on missing/invalid signature or malformed payload
/// - `404 NOT_FOUND` when the referenced lead does not exist
/// - `409 CONFLICT` when store contention outlasted the retry budget
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return Err(AppError::bad_request(format!(
            "missing {SIGNATURE_HEADER} header"
        )));
    };

    match state.reconciler.reconcile(&body, signature).await {
        Ok(outcome) => Ok(Json(WebhookAck::new(disposition(outcome)))),
        Err(ReconcileError::InvalidSignature(e)) => {
            Err(AppError::bad_request(format!("webhook signature rejected: {e}")))
        }
        Err(ReconcileError::MalformedEvent(e)) => {
            Err(AppError::bad_request(format!("malformed confirmation payload: {e}")))
        }
        Err(ReconcileError::CapacityExhausted { .. }) => {
            Ok(Json(WebhookAck::new("capacity_conflict")))
        }
        Err(ReconcileError::LeadNotFound(id)) => Err(AppError::not_found("Lead", id)),
        Err(ReconcileError::Contention(id)) => Err(AppError::conflict(format!(
            "lead {id} is under heavy contention; redeliver the event"
        ))),
        Err(ReconcileError::Store(e)) => {
            Err(AppError::internal("lead store failure").with_source(anyhow::Error::new(e)))
        }
    }
}

const fn disposition(outcome: ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Granted { .. } => "processed",
        ReconcileOutcome::AlreadyOwned { .. } => "already_owned",
        ReconcileOutcome::FailedCharge => "ignored",
        ReconcileOutcome::Duplicate => "duplicate",
    }
}
