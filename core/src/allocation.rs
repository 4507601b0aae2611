//! Slot allocation for capacity-limited leads.
//!
//! The admission gate and the conditional-commit loop live here and are
//! shared by both entry points: the client-initiated purchase and the
//! gateway-confirmed reconciliation. Both paths must converge on the same
//! invariants regardless of interleaving, so the decision is always taken
//! against a fresh read inside the commit loop, never a cached copy.
//!
//! **Concurrency strategy**: optimistic concurrency control. The lead is
//! read together with its version, the gate is evaluated, and the mutated
//! document is committed conditioned on that version. A conflicting commit
//! re-runs the whole read-decide-write sequence; splitting it into a plain
//! read followed by an unconditional write would reintroduce the lost-update
//! race this module exists to prevent.

use crate::clock::Clock;
use crate::store::{LeadStore, StoreError, StoredLead};
use crate::types::{BuyerId, LeadId, LeadStatus, LedgerEntry};
use thiserror::Error;

/// Maximum number of buyers that may share one lead.
pub const LEAD_CAPACITY: usize = 3;

/// How many times a conditional commit is retried on version conflicts
/// before the operation is surfaced as contention.
pub(crate) const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Decision of the admission gate for one candidate buyer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The candidate may take a slot
    Allow,
    /// The candidate already holds a slot; repeat attempts are a no-op
    AlreadyOwned,
    /// Every slot is taken and the candidate holds none of them
    CapacityExceeded,
}

/// Decide whether `candidate` may take a slot given the current purchasers.
///
/// Pure function; callers must evaluate it against the freshest read of the
/// purchaser set immediately before the conditional write.
#[must_use]
pub fn admit(purchasers: &[BuyerId], candidate: BuyerId) -> Admission {
    if purchasers.contains(&candidate) {
        return Admission::AlreadyOwned;
    }
    if purchasers.len() >= LEAD_CAPACITY {
        return Admission::CapacityExceeded;
    }
    Admission::Allow
}

/// Result of one allocation attempt against the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotGrant {
    /// The buyer was granted a slot; `status` is the post-grant status
    Granted {
        /// Lead status after the grant
        status: LeadStatus,
    },
    /// The buyer already held a slot; nothing was written
    AlreadyOwned {
        /// Current lead status
        status: LeadStatus,
    },
    /// The lead is full and the buyer holds no slot; nothing was written
    CapacityExceeded,
}

/// Failures of the allocation routine.
#[derive(Debug, Error)]
pub(crate) enum AllocationError {
    #[error("lead not found: {0}")]
    LeadNotFound(LeadId),
    #[error("commit contention on lead {0} exceeded the retry budget")]
    Contention(LeadId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Grant one slot on `lead_id` to `buyer_id`, committing `ledger_entry`
/// (when given) in the same atomic unit as the grant.
///
/// Transient version conflicts are retried transparently up to
/// [`MAX_COMMIT_ATTEMPTS`]; exhausting the budget surfaces as
/// [`AllocationError::Contention`]. A `DuplicateLedgerEntry` store error
/// passes through untouched so the reconciler can classify the delivery
/// as a duplicate.
pub(crate) async fn allocate_slot(
    store: &dyn LeadStore,
    clock: &dyn Clock,
    lead_id: LeadId,
    buyer_id: BuyerId,
    ledger_entry: Option<LedgerEntry>,
) -> Result<SlotGrant, AllocationError> {
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let Some(StoredLead { mut lead, version }) = store.fetch_lead(lead_id).await? else {
            return Err(AllocationError::LeadNotFound(lead_id));
        };

        match admit(&lead.purchasers, buyer_id) {
            Admission::AlreadyOwned => {
                return Ok(SlotGrant::AlreadyOwned {
                    status: lead.status,
                });
            }
            Admission::CapacityExceeded => return Ok(SlotGrant::CapacityExceeded),
            Admission::Allow => {}
        }

        lead.record_grant(buyer_id, clock.now());
        let status = lead.status;

        match store
            .commit_lead(lead_id, version, lead, ledger_entry.clone())
            .await
        {
            Ok(_) => return Ok(SlotGrant::Granted { status }),
            Err(StoreError::VersionConflict { .. }) => {
                tracing::debug!(
                    lead_id = %lead_id,
                    buyer_id = %buyer_id,
                    attempt,
                    "commit raced a concurrent writer, re-reading"
                );
            }
            Err(other) => return Err(AllocationError::Store(other)),
        }
    }

    Err(AllocationError::Contention(lead_id))
}
