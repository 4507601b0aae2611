//! Lead store trait and related types.
//!
//! This module defines the abstraction over the document store that holds
//! lead documents and the payment ledger. The store is an external service
//! from the engine's point of view; all the engine requires of it is:
//!
//! - fetch a lead document together with its version
//! - commit a mutated document conditioned on that version (compare-and-set)
//! - append a ledger entry under a unique key, atomically with the commit
//!
//! # Optimistic concurrency
//!
//! Every commit names the version the document was read at. If another
//! writer got there first the store answers [`StoreError::VersionConflict`]
//! and the caller re-runs its read-decide-write sequence. This is the only
//! coordination mechanism in the system; no component takes locks.
//!
//! # Implementations
//!
//! - [`memory::MemoryLeadStore`]: in-process reference implementation used
//!   by tests and the development server
//! - production deployments adapt a real document store (one offering
//!   serializable single-document transactions) behind this trait

use crate::types::{GatewayEventId, Lead, LeadId, LedgerEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub mod memory;

/// Monotonic version of a stored lead document.
///
/// Starts at zero on insert and advances by one per committed mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a version from a raw counter value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lead document together with the version it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredLead {
    /// The document contents
    pub lead: Lead,
    /// Version to name in a subsequent conditional commit
    pub version: Version,
}

/// Errors that can occur during lead store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The lead does not exist.
    #[error("lead not found: {0}")]
    LeadNotFound(LeadId),

    /// Conditional commit lost a race with a concurrent writer.
    ///
    /// The caller's read is stale; re-read and re-decide before retrying.
    #[error("version conflict on lead {lead_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The lead where the conflict occurred
        lead_id: LeadId,
        /// The version the caller read
        expected: Version,
        /// The version the store currently holds
        actual: Version,
    },

    /// The ledger already holds an entry under this gateway event id.
    ///
    /// The commit was aborted as a whole; neither the lead update nor the
    /// entry was applied.
    #[error("ledger already holds an entry for gateway event {0}")]
    DuplicateLedgerEntry(GatewayEventId),

    /// A lead with this id already exists.
    #[error("lead already exists: {0}")]
    LeadExists(LeadId),

    /// Underlying storage failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Document store for leads and the payment ledger.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be safely shared across request
/// handlers.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so
/// the store can be carried as a trait object (`Arc<dyn LeadStore>`).
pub trait LeadStore: Send + Sync {
    /// Fetch a lead document by id.
    ///
    /// Returns `None` when no such lead exists (missing leads are an
    /// expected condition for callers, not a store failure).
    ///
    /// # Errors
    ///
    /// - `Backend`: the underlying storage failed
    fn fetch_lead(
        &self,
        lead_id: LeadId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StoredLead>, StoreError>> + Send + '_>>;

    /// Insert a brand new lead document at version zero.
    ///
    /// Intake is a plain insert with no invariants beyond id uniqueness.
    ///
    /// # Errors
    ///
    /// - `LeadExists`: a lead with this id is already stored
    /// - `Backend`: the underlying storage failed
    fn insert_lead(
        &self,
        lead: Lead,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Commit a mutated lead conditioned on `expected`, optionally appending
    /// `ledger_entry` in the same atomic unit.
    ///
    /// When an entry is supplied, the unique-key ledger insert and the lead
    /// update either both take effect or neither does. Returns the version
    /// the document advanced to.
    ///
    /// # Errors
    ///
    /// - `VersionConflict`: the document moved since it was read
    /// - `DuplicateLedgerEntry`: the entry's gateway event id is already
    ///   recorded; nothing was written
    /// - `LeadNotFound`: the lead vanished (never happens for leads, which
    ///   are not deleted, but the contract covers it)
    /// - `Backend`: the underlying storage failed
    fn commit_lead(
        &self,
        lead_id: LeadId,
        expected: Version,
        lead: Lead,
        ledger_entry: Option<LedgerEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>>;

    /// Whether the ledger already holds an entry for `gateway_event_id`.
    ///
    /// A fast-path probe for redelivered confirmations. The authoritative
    /// duplicate check remains the unique-key insert inside `commit_lead`;
    /// this probe only short-circuits the common replay case.
    ///
    /// # Errors
    ///
    /// - `Backend`: the underlying storage failed
    fn ledger_contains(
        &self,
        gateway_event_id: GatewayEventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;
}
