//! Client-initiated purchase orchestration.
//!
//! The optimistic path: a buyer asks for a slot before payment has been
//! collected. The coordinator re-reads the lead inside the conditional
//! commit loop, applies the admission gate, and commits the grant. Payment
//! collection is the caller's follow-up step; this operation only reserves
//! access.

use crate::allocation::{allocate_slot, AllocationError, SlotGrant};
use crate::clock::Clock;
use crate::store::{LeadStore, StoreError};
use crate::types::{BuyerId, LeadId, LeadStatus};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a purchase attempt.
///
/// `AlreadyOwned` and `CapacityExceeded` are expected outcomes, not errors:
/// callers present them to the buyer as specific feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// The buyer now holds a slot
    Granted {
        /// Lead status after the grant
        status: LeadStatus,
    },
    /// The buyer already held a slot; nothing changed
    AlreadyOwned {
        /// Current lead status
        status: LeadStatus,
    },
    /// Every slot is taken; nothing changed
    CapacityExceeded,
}

impl PurchaseOutcome {
    /// Whether this outcome granted a slot.
    #[must_use]
    pub const fn granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Failures of the purchase operation.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The lead does not exist
    #[error("lead not found: {0}")]
    LeadNotFound(LeadId),
    /// Store contention outlasted the retry budget; the purchase may be retried
    #[error("persistent contention on lead {0}; retry the purchase")]
    Contention(LeadId),
    /// The store failed
    #[error(transparent)]
    Store(StoreError),
}

/// Orchestrates client-initiated purchases.
pub struct PurchaseCoordinator {
    store: Arc<dyn LeadStore>,
    clock: Arc<dyn Clock>,
}

impl PurchaseCoordinator {
    /// Creates a coordinator over the given store and clock.
    #[must_use]
    pub fn new(store: Arc<dyn LeadStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Attempt to grant `buyer_id` a slot on `lead_id`.
    ///
    /// # Errors
    ///
    /// - [`PurchaseError::LeadNotFound`] when the lead does not exist
    /// - [`PurchaseError::Contention`] when commit conflicts outlast the
    ///   retry budget (retryable by the caller)
    /// - [`PurchaseError::Store`] on backend failure
    pub async fn purchase(
        &self,
        lead_id: LeadId,
        buyer_id: BuyerId,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        match allocate_slot(
            self.store.as_ref(),
            self.clock.as_ref(),
            lead_id,
            buyer_id,
            None,
        )
        .await
        {
            Ok(SlotGrant::Granted { status }) => {
                tracing::info!(
                    lead_id = %lead_id,
                    buyer_id = %buyer_id,
                    status = %status,
                    "purchase granted"
                );
                Ok(PurchaseOutcome::Granted { status })
            }
            Ok(SlotGrant::AlreadyOwned { status }) => {
                tracing::debug!(lead_id = %lead_id, buyer_id = %buyer_id, "buyer already holds a slot");
                Ok(PurchaseOutcome::AlreadyOwned { status })
            }
            Ok(SlotGrant::CapacityExceeded) => {
                tracing::debug!(lead_id = %lead_id, buyer_id = %buyer_id, "lead is fully allocated");
                Ok(PurchaseOutcome::CapacityExceeded)
            }
            Err(AllocationError::LeadNotFound(id)) => Err(PurchaseError::LeadNotFound(id)),
            Err(AllocationError::Contention(id)) => {
                tracing::warn!(lead_id = %id, buyer_id = %buyer_id, "purchase gave up after repeated commit conflicts");
                Err(PurchaseError::Contention(id))
            }
            Err(AllocationError::Store(e)) => Err(PurchaseError::Store(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryLeadStore;
    use crate::types::Lead;
    use leadmarket_testing::mocks::test_clock;

    fn coordinator() -> (MemoryLeadStore, PurchaseCoordinator, LeadId) {
        let store = MemoryLeadStore::new();
        let clock = Arc::new(test_clock());
        let lead_id = LeadId::new();
        let coordinator = PurchaseCoordinator::new(Arc::new(store.clone()), clock);
        (store, coordinator, lead_id)
    }

    async fn seed(store: &MemoryLeadStore, lead_id: LeadId) {
        use crate::clock::Clock as _;
        store
            .insert_lead(Lead::new(lead_id, test_clock().now()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_purchase_grants_and_marks_purchased() {
        let (store, coordinator, lead_id) = coordinator();
        seed(&store, lead_id).await;

        let outcome = coordinator.purchase(lead_id, BuyerId::new()).await.unwrap();
        assert_eq!(
            outcome,
            PurchaseOutcome::Granted {
                status: LeadStatus::Purchased
            }
        );

        let stored = store.fetch_lead(lead_id).await.unwrap().unwrap();
        assert_eq!(stored.lead.purchaser_count(), 1);
        assert_eq!(stored.lead.status, LeadStatus::Purchased);
    }

    #[tokio::test]
    async fn repeat_purchase_is_an_idempotent_no_op() {
        let (store, coordinator, lead_id) = coordinator();
        seed(&store, lead_id).await;

        let buyer = BuyerId::new();
        coordinator.purchase(lead_id, buyer).await.unwrap();
        let before = store.fetch_lead(lead_id).await.unwrap();

        let outcome = coordinator.purchase(lead_id, buyer).await.unwrap();
        assert_eq!(
            outcome,
            PurchaseOutcome::AlreadyOwned {
                status: LeadStatus::Purchased
            }
        );

        // No mutation: same document, same version.
        let after = store.fetch_lead(lead_id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unknown_lead_is_reported_as_not_found() {
        let (_, coordinator, lead_id) = coordinator();
        let err = coordinator
            .purchase(lead_id, BuyerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::LeadNotFound(id) if id == lead_id));
    }
}
