//! # Leadmarket Core
//!
//! Capacity allocation and payment reconciliation engine for shared leads.
//!
//! A lead is a capacity-limited resource: up to [`allocation::LEAD_CAPACITY`]
//! buyers may each hold one slot on it. Two independent write paths race to
//! allocate those slots:
//!
//! - **Optimistic purchase** ([`purchase::PurchaseCoordinator`]): a buyer
//!   claims a slot directly; payment collection follows separately.
//! - **Confirmed purchase** ([`reconcile::WebhookReconciler`]): the payment
//!   gateway reports a completed charge asynchronously, at-least-once.
//!
//! Both paths run the same allocation routine: re-read the lead inside a
//! conditional-commit loop, apply the admission gate, recompute the derived
//! status from the new purchaser count, and commit against the version the
//! document was read at. The confirmed path additionally appends a ledger
//! entry keyed by the gateway's event id in the same atomic commit, which is
//! what makes redeliveries safe.
//!
//! # Invariants
//!
//! - A lead never holds more than [`allocation::LEAD_CAPACITY`] purchasers,
//!   regardless of interleaving.
//! - A lead's status always equals
//!   [`types::LeadStatus::for_purchaser_count`] of its purchaser count.
//! - A gateway event id appears at most once in the ledger, and a ledger
//!   entry exists exactly when its grant was committed.

pub mod allocation;
pub mod clock;
pub mod gateway;
pub mod purchase;
pub mod reconcile;
pub mod store;
pub mod types;

pub use allocation::{admit, Admission, LEAD_CAPACITY};
pub use clock::{Clock, SystemClock};
pub use gateway::{HmacSha256Verifier, SignatureError, WebhookVerifier};
pub use purchase::{PurchaseCoordinator, PurchaseError, PurchaseOutcome};
pub use reconcile::{ReconcileError, ReconcileOutcome, WebhookReconciler};
pub use store::{LeadStore, StoreError, StoredLead, Version};
pub use types::{
    BuyerId, ChargeOutcome, GatewayEventId, Lead, LeadId, LeadStatus, LedgerEntry, Money,
    PaymentConfirmation,
};
