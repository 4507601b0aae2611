//! Gateway-confirmed purchase reconciliation.
//!
//! The confirmed path: the payment gateway reports a charge for a
//! `(lead, buyer)` pair, possibly long after the fact and possibly more
//! than once. The reconciler authenticates the delivery, absorbs
//! redeliveries through the ledger's unique event key, and then runs the
//! same allocation routine as the client purchase path, with the ledger
//! append committed atomically alongside the grant.

use crate::allocation::{allocate_slot, AllocationError, SlotGrant};
use crate::clock::Clock;
use crate::gateway::{SignatureError, WebhookVerifier};
use crate::store::{LeadStore, StoreError};
use crate::types::{
    BuyerId, ChargeOutcome, GatewayEventId, LeadId, LeadStatus, LedgerEntry, PaymentConfirmation,
};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of reconciling one confirmation delivery.
///
/// Every variant is an acknowledgeable result: the gateway should stop
/// redelivering in all of these cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The confirmation granted the buyer a slot and was recorded
    Granted {
        /// Lead status after the grant
        status: LeadStatus,
    },
    /// The buyer already held a slot (the optimistic path got there first);
    /// nothing was written
    AlreadyOwned {
        /// Current lead status
        status: LeadStatus,
    },
    /// The charge failed at the gateway; there is nothing to reconcile
    FailedCharge,
    /// A redelivery of an already-recorded event; nothing was written
    Duplicate,
}

/// Failures of the reconciliation operation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The delivery could not be authenticated; it was not processed
    #[error("webhook signature rejected: {0}")]
    InvalidSignature(#[from] SignatureError),
    /// The payload was authenticated but is not a valid confirmation event
    #[error("malformed confirmation payload: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    /// The referenced lead does not exist
    #[error("lead not found: {0}")]
    LeadNotFound(LeadId),
    /// Payment succeeded but every slot is already taken.
    ///
    /// A reconciliation conflict: the buyer paid for a slot that cannot be
    /// granted. Surfaced so an operator-driven compensation (refund) can be
    /// triggered; nothing was written.
    #[error("payment {gateway_event_id} confirmed for fully allocated lead {lead_id}; buyer {buyer_id} needs compensation")]
    CapacityExhausted {
        /// The full lead
        lead_id: LeadId,
        /// The buyer whose payment cannot be honored
        buyer_id: BuyerId,
        /// The confirmed payment event
        gateway_event_id: GatewayEventId,
    },
    /// Store contention outlasted the retry budget; the gateway may redeliver
    #[error("persistent contention on lead {0}; redeliver the event")]
    Contention(LeadId),
    /// The store failed
    #[error(transparent)]
    Store(StoreError),
}

/// Orchestrates gateway-confirmed purchases.
pub struct WebhookReconciler {
    store: Arc<dyn LeadStore>,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn WebhookVerifier>,
}

impl WebhookReconciler {
    /// Creates a reconciler over the given store, clock and verifier.
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn WebhookVerifier>,
    ) -> Self {
        Self {
            store,
            clock,
            verifier,
        }
    }

    /// Verify, parse and apply one confirmation delivery.
    ///
    /// The signature is checked before a single payload byte is trusted;
    /// unverifiable deliveries touch no state.
    ///
    /// # Errors
    ///
    /// See [`ReconcileError`]; benign dispositions (duplicates, failed
    /// charges, already-owned convergence) are outcomes, not errors.
    pub async fn reconcile(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.verifier.verify(payload, signature_header)?;
        let event: PaymentConfirmation = serde_json::from_slice(payload)?;
        self.apply(event).await
    }

    /// Apply an already-authenticated confirmation event.
    ///
    /// # Errors
    ///
    /// See [`ReconcileError`].
    pub async fn apply(
        &self,
        event: PaymentConfirmation,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if event.outcome == ChargeOutcome::Failed {
            tracing::debug!(
                gateway_event_id = %event.gateway_event_id,
                lead_id = %event.lead_id,
                "failed charge carries nothing to reconcile"
            );
            return Ok(ReconcileOutcome::FailedCharge);
        }

        // Fast-path replay detection. The authoritative check is the
        // unique-key insert inside the commit below; this probe only spares
        // redeliveries the allocation work.
        if self
            .store
            .ledger_contains(event.gateway_event_id.clone())
            .await
            .map_err(ReconcileError::Store)?
        {
            tracing::debug!(
                gateway_event_id = %event.gateway_event_id,
                "redelivered confirmation ignored"
            );
            return Ok(ReconcileOutcome::Duplicate);
        }

        let entry = LedgerEntry {
            gateway_event_id: event.gateway_event_id.clone(),
            lead_id: event.lead_id,
            buyer_id: event.buyer_id,
            amount: event.amount,
            recorded_at: self.clock.now(),
        };

        match allocate_slot(
            self.store.as_ref(),
            self.clock.as_ref(),
            event.lead_id,
            event.buyer_id,
            Some(entry),
        )
        .await
        {
            Ok(SlotGrant::Granted { status }) => {
                tracing::info!(
                    gateway_event_id = %event.gateway_event_id,
                    lead_id = %event.lead_id,
                    buyer_id = %event.buyer_id,
                    status = %status,
                    "confirmed payment granted a slot"
                );
                Ok(ReconcileOutcome::Granted { status })
            }
            Ok(SlotGrant::AlreadyOwned { status }) => {
                tracing::debug!(
                    gateway_event_id = %event.gateway_event_id,
                    lead_id = %event.lead_id,
                    buyer_id = %event.buyer_id,
                    "confirmation converged with an earlier grant"
                );
                Ok(ReconcileOutcome::AlreadyOwned { status })
            }
            Ok(SlotGrant::CapacityExceeded) => {
                tracing::error!(
                    gateway_event_id = %event.gateway_event_id,
                    lead_id = %event.lead_id,
                    buyer_id = %event.buyer_id,
                    "confirmed payment for a fully allocated lead; compensation required"
                );
                Err(ReconcileError::CapacityExhausted {
                    lead_id: event.lead_id,
                    buyer_id: event.buyer_id,
                    gateway_event_id: event.gateway_event_id,
                })
            }
            Err(AllocationError::Store(StoreError::DuplicateLedgerEntry(_))) => {
                // Two deliveries of the same event raced past the probe; the
                // commit's unique key let exactly one of them through.
                Ok(ReconcileOutcome::Duplicate)
            }
            Err(AllocationError::LeadNotFound(id)) => Err(ReconcileError::LeadNotFound(id)),
            Err(AllocationError::Contention(id)) => {
                tracing::warn!(
                    gateway_event_id = %event.gateway_event_id,
                    lead_id = %id,
                    "reconciliation gave up after repeated commit conflicts"
                );
                Err(ReconcileError::Contention(id))
            }
            Err(AllocationError::Store(e)) => Err(ReconcileError::Store(e)),
        }
    }
}
