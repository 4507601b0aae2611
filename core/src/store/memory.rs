//! In-memory lead store.
//!
//! Reference implementation of [`LeadStore`] over a mutex-guarded map.
//! Commits are serialized per process, which gives the same single-document
//! atomicity a real document store provides; tests and the development
//! server run against it.

use super::{LeadStore, StoreError, StoredLead, Version};
use crate::types::{GatewayEventId, Lead, LeadId, LedgerEntry};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    leads: HashMap<LeadId, (Lead, Version)>,
    ledger_keys: HashSet<GatewayEventId>,
    ledger: Vec<LedgerEntry>,
}

/// In-memory [`LeadStore`] implementation.
///
/// Cloning yields another handle onto the same underlying state, which lets
/// tests keep a handle for assertions after moving one into the application.
#[derive(Clone, Debug, Default)]
pub struct MemoryLeadStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLeadStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every ledger entry recorded so far, in append order.
    #[must_use]
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned mutex only means another test thread panicked mid-write;
        // the data itself is still coherent for single-field maps.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fetch_sync(&self, lead_id: LeadId) -> Option<StoredLead> {
        self.lock().leads.get(&lead_id).map(|(lead, version)| StoredLead {
            lead: lead.clone(),
            version: *version,
        })
    }

    fn insert_sync(&self, lead: Lead) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.leads.contains_key(&lead.id) {
            return Err(StoreError::LeadExists(lead.id));
        }
        let id = lead.id;
        inner.leads.insert(id, (lead, Version::new(0)));
        Ok(())
    }

    fn commit_sync(
        &self,
        lead_id: LeadId,
        expected: Version,
        lead: Lead,
        ledger_entry: Option<LedgerEntry>,
    ) -> Result<Version, StoreError> {
        let mut inner = self.lock();

        let actual = match inner.leads.get(&lead_id) {
            Some((_, version)) => *version,
            None => return Err(StoreError::LeadNotFound(lead_id)),
        };
        if actual != expected {
            return Err(StoreError::VersionConflict {
                lead_id,
                expected,
                actual,
            });
        }
        if let Some(entry) = &ledger_entry {
            if inner.ledger_keys.contains(&entry.gateway_event_id) {
                return Err(StoreError::DuplicateLedgerEntry(
                    entry.gateway_event_id.clone(),
                ));
            }
        }

        // All checks passed: apply the document update and the ledger append
        // together under the same lock.
        let next = expected.next();
        inner.leads.insert(lead_id, (lead, next));
        if let Some(entry) = ledger_entry {
            inner.ledger_keys.insert(entry.gateway_event_id.clone());
            inner.ledger.push(entry);
        }
        Ok(next)
    }
}

impl LeadStore for MemoryLeadStore {
    fn fetch_lead(
        &self,
        lead_id: LeadId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StoredLead>, StoreError>> + Send + '_>> {
        let result = self.fetch_sync(lead_id);
        Box::pin(async move { Ok(result) })
    }

    fn insert_lead(
        &self,
        lead: Lead,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let result = self.insert_sync(lead);
        Box::pin(async move { result })
    }

    fn commit_lead(
        &self,
        lead_id: LeadId,
        expected: Version,
        lead: Lead,
        ledger_entry: Option<LedgerEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        let result = self.commit_sync(lead_id, expected, lead, ledger_entry);
        Box::pin(async move { result })
    }

    fn ledger_contains(
        &self,
        gateway_event_id: GatewayEventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let result = self.lock().ledger_keys.contains(&gateway_event_id);
        Box::pin(async move { Ok(result) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::Utc;

    fn lead() -> Lead {
        Lead::new(LeadId::new(), Utc::now())
    }

    fn entry(event: &str, lead_id: LeadId) -> LedgerEntry {
        LedgerEntry {
            gateway_event_id: GatewayEventId::new(event),
            lead_id,
            buyer_id: crate::types::BuyerId::new(),
            amount: Money::from_cents(25_00),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_then_fetch_round_trips_at_version_zero() {
        let store = MemoryLeadStore::new();
        let lead = lead();
        let id = lead.id;
        store.insert_lead(lead.clone()).await.unwrap();

        let stored = store.fetch_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.lead, lead);
        assert_eq!(stored.version, Version::new(0));
    }

    #[tokio::test]
    async fn double_insert_is_rejected() {
        let store = MemoryLeadStore::new();
        let lead = lead();
        store.insert_lead(lead.clone()).await.unwrap();
        let err = store.insert_lead(lead).await.unwrap_err();
        assert!(matches!(err, StoreError::LeadExists(_)));
    }

    #[tokio::test]
    async fn commit_checks_the_expected_version() {
        let store = MemoryLeadStore::new();
        let lead = lead();
        let id = lead.id;
        store.insert_lead(lead.clone()).await.unwrap();

        let v1 = store
            .commit_lead(id, Version::new(0), lead.clone(), None)
            .await
            .unwrap();
        assert_eq!(v1, Version::new(1));

        // A writer still holding the version-zero read must be refused.
        let err = store
            .commit_lead(id, Version::new(0), lead, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn duplicate_ledger_key_aborts_the_whole_commit() {
        let store = MemoryLeadStore::new();
        let lead = lead();
        let id = lead.id;
        store.insert_lead(lead.clone()).await.unwrap();

        store
            .commit_lead(id, Version::new(0), lead.clone(), Some(entry("evt_1", id)))
            .await
            .unwrap();

        let err = store
            .commit_lead(id, Version::new(1), lead, Some(entry("evt_1", id)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateLedgerEntry(_)));

        // The refused commit left neither effect behind.
        let stored = store.fetch_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::new(1));
        assert_eq!(store.ledger_entries().len(), 1);
        assert!(store
            .ledger_contains(GatewayEventId::new("evt_1"))
            .await
            .unwrap());
    }
}
