//! Domain types for the lead marketplace.
//!
//! Value objects and entities shared by the purchase and reconciliation
//! paths: identifiers, the lead document itself, payment confirmation
//! events and ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a lead
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(Uuid);

impl LeadId {
    /// Creates a new random `LeadId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `LeadId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a buyer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuyerId(Uuid);

impl BuyerId {
    /// Creates a new random `BuyerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BuyerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BuyerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuyerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gateway-issued identifier for a payment confirmation event.
///
/// Redeliveries of the same logical event reuse this identifier, which makes
/// it the idempotency key for the confirmed purchase path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayEventId(String);

impl GatewayEventId {
    /// Wrap a gateway-issued event identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Lead lifecycle
// ============================================================================

/// Lifecycle status of a lead, derived from its purchaser count.
///
/// The status is never stored independently of the count: every committed
/// mutation recomputes it with [`LeadStatus::for_purchaser_count`], so count
/// and status cannot drift apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    /// No buyer holds a slot yet
    New,
    /// At least one slot is taken, at least one remains
    Purchased,
    /// Every slot is taken; no further grants are possible
    Archived,
}

impl LeadStatus {
    /// Derive the status for a given purchaser count.
    #[must_use]
    pub const fn for_purchaser_count(count: usize) -> Self {
        match count {
            0 => Self::New,
            1 | 2 => Self::Purchased,
            _ => Self::Archived,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Purchased => write!(f, "Purchased"),
            Self::Archived => write!(f, "Archived"),
        }
    }
}

/// A capacity-limited lead document.
///
/// The document is the single source of truth for allocation state. It is
/// mutated only through the purchase coordinator and the webhook reconciler;
/// read paths never write it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Lead identifier
    pub id: LeadId,
    /// Buyers holding a slot, in grant order (order is for display only)
    pub purchasers: Vec<BuyerId>,
    /// Instant each buyer was granted a slot
    pub purchase_timestamps: HashMap<BuyerId, DateTime<Utc>>,
    /// Derived lifecycle status
    pub status: LeadStatus,
    /// When the lead was created
    pub created_at: DateTime<Utc>,
    /// When the lead was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Creates a fresh lead with no purchasers.
    #[must_use]
    pub fn new(id: LeadId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            purchasers: Vec::new(),
            purchase_timestamps: HashMap::new(),
            status: LeadStatus::New,
            created_at,
            updated_at: created_at,
        }
    }

    /// Whether `buyer` already holds a slot on this lead.
    #[must_use]
    pub fn owns(&self, buyer: BuyerId) -> bool {
        self.purchasers.contains(&buyer)
    }

    /// Number of buyers currently holding a slot.
    #[must_use]
    pub fn purchaser_count(&self) -> usize {
        self.purchasers.len()
    }

    /// Records a slot grant for `buyer` at `granted_at`.
    ///
    /// Caller must have admitted the buyer through the capacity gate first;
    /// the method assumes `buyer` is not already a member.
    pub(crate) fn record_grant(&mut self, buyer: BuyerId, granted_at: DateTime<Utc>) {
        self.purchasers.push(buyer);
        self.purchase_timestamps.insert(buyer, granted_at);
        self.status = LeadStatus::for_purchaser_count(self.purchasers.len());
        self.updated_at = granted_at;
    }
}

// ============================================================================
// Payment confirmation events
// ============================================================================

/// Outcome reported by the payment gateway for a charge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeOutcome {
    /// The charge went through
    Succeeded,
    /// The charge was declined or otherwise failed
    Failed,
}

/// A payment confirmation delivered by the gateway webhook.
///
/// Deliveries are at-least-once: the same logical event may arrive any number
/// of times, always carrying the same `gateway_event_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Gateway-issued event identifier (stable across redeliveries)
    pub gateway_event_id: GatewayEventId,
    /// Lead the payment was collected for
    pub lead_id: LeadId,
    /// Buyer the payment was collected from
    pub buyer_id: BuyerId,
    /// Amount charged
    pub amount: Money,
    /// Charge outcome; only `Succeeded` drives allocation
    pub outcome: ChargeOutcome,
}

/// An append-only record of one processed payment confirmation.
///
/// The ledger exists for duplicate detection and audit. It is never read to
/// derive allocation state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Gateway-issued event identifier; unique across the whole ledger
    pub gateway_event_id: GatewayEventId,
    /// Lead the payment was collected for
    pub lead_id: LeadId,
    /// Buyer the payment was collected from
    pub buyer_id: BuyerId,
    /// Amount charged
    pub amount: Money,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_purchaser_count() {
        assert_eq!(LeadStatus::for_purchaser_count(0), LeadStatus::New);
        assert_eq!(LeadStatus::for_purchaser_count(1), LeadStatus::Purchased);
        assert_eq!(LeadStatus::for_purchaser_count(2), LeadStatus::Purchased);
        assert_eq!(LeadStatus::for_purchaser_count(3), LeadStatus::Archived);
        assert_eq!(LeadStatus::for_purchaser_count(7), LeadStatus::Archived);
    }

    #[test]
    fn record_grant_updates_count_status_and_timestamps() {
        let created = chrono::DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut lead = Lead::new(LeadId::new(), created);
        assert_eq!(lead.status, LeadStatus::New);

        let buyer = BuyerId::new();
        let granted = created + chrono::Duration::minutes(5);
        lead.record_grant(buyer, granted);

        assert!(lead.owns(buyer));
        assert_eq!(lead.purchaser_count(), 1);
        assert_eq!(lead.status, LeadStatus::Purchased);
        assert_eq!(lead.purchase_timestamps[&buyer], granted);
        assert_eq!(lead.updated_at, granted);
    }

    #[test]
    fn charge_outcome_wire_format() {
        let json = serde_json::to_string(&ChargeOutcome::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        let back: ChargeOutcome = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, ChargeOutcome::Failed);
    }
}
