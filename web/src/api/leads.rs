//! Lead purchase and snapshot endpoints.
//!
//! - `POST /api/leads/{id}/purchase`: optimistic purchase; payment
//!   collection is the client's follow-up step
//! - `GET /api/leads/{id}`: read-only allocation snapshot
//!
//! Rejections are specific, not generic: a repeat purchase and a full lead
//! come back as distinct reasons so the UI can say which one happened.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use leadmarket_core::{
    BuyerId, Lead, LeadId, LeadStatus, PurchaseError, PurchaseOutcome, LEAD_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Request to purchase a slot on a lead.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer asking for the slot
    pub buyer_id: Uuid,
}

/// Response to a purchase attempt.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// Whether a slot was granted by this call
    pub granted: bool,
    /// Lead status after the attempt
    pub status: LeadStatus,
    /// Rejection reason when `granted` is false
    /// (`already_owned` or `capacity_exceeded`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Read-only allocation snapshot of a lead.
#[derive(Debug, Serialize)]
pub struct LeadResponse {
    /// Lead identifier
    pub id: Uuid,
    /// Derived lifecycle status
    pub status: LeadStatus,
    /// Buyers currently holding a slot, in grant order
    pub purchasers: Vec<Uuid>,
    /// Number of slots taken
    pub purchaser_count: usize,
    /// Total slots on every lead
    pub capacity: usize,
    /// Instant each buyer was granted a slot
    pub purchase_timestamps: HashMap<Uuid, DateTime<Utc>>,
    /// When the lead was created
    pub created_at: DateTime<Utc>,
    /// When the lead was last mutated
    pub updated_at: DateTime<Utc>,
}

impl LeadResponse {
    fn from_lead(lead: &Lead) -> Self {
        Self {
            id: *lead.id.as_uuid(),
            status: lead.status,
            purchasers: lead.purchasers.iter().map(|b| *b.as_uuid()).collect(),
            purchaser_count: lead.purchaser_count(),
            capacity: LEAD_CAPACITY,
            purchase_timestamps: lead
                .purchase_timestamps
                .iter()
                .map(|(buyer, at)| (*buyer.as_uuid(), *at))
                .collect(),
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

/// Attempt to purchase a slot on a lead.
///
/// # Errors
///
/// - `404 NOT_FOUND` when the lead does not exist
/// - `409 CONFLICT` when store contention outlasted the retry budget
///   (the client may simply retry)
pub async fn purchase_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let lead_id = LeadId::from_uuid(lead_id);
    let buyer_id = BuyerId::from_uuid(request.buyer_id);

    let outcome = state
        .coordinator
        .purchase(lead_id, buyer_id)
        .await
        .map_err(purchase_error)?;

    Ok(Json(match outcome {
        PurchaseOutcome::Granted { status } => PurchaseResponse {
            granted: true,
            status,
            reason: None,
        },
        PurchaseOutcome::AlreadyOwned { status } => PurchaseResponse {
            granted: false,
            status,
            reason: Some("already_owned".to_string()),
        },
        // A full lead is archived by definition.
        PurchaseOutcome::CapacityExceeded => PurchaseResponse {
            granted: false,
            status: LeadStatus::Archived,
            reason: Some("capacity_exceeded".to_string()),
        },
    }))
}

/// Fetch a read-only allocation snapshot of a lead.
///
/// # Errors
///
/// - `404 NOT_FOUND` when the lead does not exist
pub async fn get_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<LeadResponse>, AppError> {
    let lead_id = LeadId::from_uuid(lead_id);
    let stored = state
        .store
        .fetch_lead(lead_id)
        .await
        .map_err(|e| AppError::internal("lead store failure").with_source(anyhow::Error::new(e)))?
        .ok_or_else(|| AppError::not_found("Lead", lead_id))?;

    Ok(Json(LeadResponse::from_lead(&stored.lead)))
}

fn purchase_error(err: PurchaseError) -> AppError {
    match err {
        PurchaseError::LeadNotFound(id) => AppError::not_found("Lead", id),
        PurchaseError::Contention(id) => AppError::conflict(format!(
            "lead {id} is under heavy contention; retry the purchase"
        )),
        PurchaseError::Store(e) => {
            AppError::internal("lead store failure").with_source(anyhow::Error::new(e))
        }
    }
}
