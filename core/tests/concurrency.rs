//! Concurrency tests for last-slot scenarios.
//!
//! Verifies that racing writers, on either entry path or both at once,
//! never push a lead past capacity: the conditional commit forces every
//! loser to re-read and hit the gate on fresh state.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use leadmarket_core::store::memory::MemoryLeadStore;
use leadmarket_core::{
    BuyerId, ChargeOutcome, Clock as _, GatewayEventId, HmacSha256Verifier, Lead, LeadId,
    LeadStatus, LeadStore, Money, PaymentConfirmation, PurchaseCoordinator, PurchaseOutcome,
    ReconcileOutcome, WebhookReconciler,
};
use leadmarket_testing::test_clock;
use std::sync::Arc;

fn confirmation(lead_id: LeadId, buyer_id: BuyerId, event: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        gateway_event_id: GatewayEventId::new(event),
        lead_id,
        buyer_id,
        amount: Money::from_cents(49_00),
        outcome: ChargeOutcome::Succeeded,
    }
}

async fn seeded_store(lead_id: LeadId) -> MemoryLeadStore {
    let store = MemoryLeadStore::new();
    store
        .insert_lead(Lead::new(lead_id, test_clock().now()))
        .await
        .unwrap();
    store
}

/// Eight distinct buyers race for three slots: exactly three grants, five
/// capacity rejections, and the stored lead holds exactly three purchasers.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_purchases_never_exceed_capacity() {
    let lead_id = LeadId::new();
    let store = seeded_store(lead_id).await;
    let coordinator = Arc::new(PurchaseCoordinator::new(
        Arc::new(store.clone()),
        Arc::new(test_clock()),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.purchase(lead_id, BuyerId::new()).await
        }));
    }

    let outcomes: Vec<PurchaseOutcome> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("purchase errored"))
        .collect();

    let granted = outcomes.iter().filter(|o| o.granted()).count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, PurchaseOutcome::CapacityExceeded))
        .count();
    assert_eq!(granted, 3);
    assert_eq!(rejected, 5);

    let stored = store.fetch_lead(lead_id).await.unwrap().unwrap();
    assert_eq!(stored.lead.purchaser_count(), 3);
    assert_eq!(stored.lead.status, LeadStatus::Archived);
}

/// Both entry paths race for the single remaining slot: exactly one writer
/// wins overall, and a ledger entry exists only if a webhook was the winner.
#[tokio::test(flavor = "multi_thread")]
async fn mixed_paths_race_for_the_last_slot() {
    let lead_id = LeadId::new();
    let store = seeded_store(lead_id).await;
    let clock = Arc::new(test_clock());
    let coordinator = Arc::new(PurchaseCoordinator::new(
        Arc::new(store.clone()),
        clock.clone(),
    ));
    let verifier = Arc::new(HmacSha256Verifier::new(
        "whsec_test",
        Duration::minutes(5),
        clock.clone(),
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        Arc::new(store.clone()),
        clock,
        verifier,
    ));

    // Two slots already taken; one remains.
    coordinator.purchase(lead_id, BuyerId::new()).await.unwrap();
    coordinator.purchase(lead_id, BuyerId::new()).await.unwrap();

    let mut purchase_handles = Vec::new();
    for _ in 0..2 {
        let coordinator = Arc::clone(&coordinator);
        purchase_handles.push(tokio::spawn(async move {
            coordinator.purchase(lead_id, BuyerId::new()).await
        }));
    }
    let mut webhook_handles = Vec::new();
    for n in 0..3 {
        let reconciler = Arc::clone(&reconciler);
        webhook_handles.push(tokio::spawn(async move {
            reconciler
                .apply(confirmation(lead_id, BuyerId::new(), &format!("evt_{n}")))
                .await
        }));
    }

    let purchase_grants = futures::future::join_all(purchase_handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .filter(|result| matches!(result, Ok(o) if o.granted()))
        .count();
    let webhook_grants = futures::future::join_all(webhook_handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .filter(|result| matches!(result, Ok(ReconcileOutcome::Granted { .. })))
        .count();

    assert_eq!(purchase_grants + webhook_grants, 1);

    let stored = store.fetch_lead(lead_id).await.unwrap().unwrap();
    assert_eq!(stored.lead.purchaser_count(), 3);
    assert_eq!(stored.lead.status, LeadStatus::Archived);

    // The ledger moves in lockstep with webhook grants and nothing else.
    assert_eq!(store.ledger_entries().len(), webhook_grants);
}

/// Four concurrent deliveries of the same gateway event: exactly one grant
/// lands, one ledger entry exists, and every loser resolves benignly (as a
/// duplicate, or as already-owned when it re-read after the winner's commit).
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_redeliveries_grant_exactly_once() {
    let lead_id = LeadId::new();
    let store = seeded_store(lead_id).await;
    let clock = Arc::new(test_clock());
    let verifier = Arc::new(HmacSha256Verifier::new(
        "whsec_test",
        Duration::minutes(5),
        clock.clone(),
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        Arc::new(store.clone()),
        clock,
        verifier,
    ));

    let buyer = BuyerId::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let reconciler = Arc::clone(&reconciler);
        handles.push(tokio::spawn(async move {
            reconciler
                .apply(confirmation(lead_id, buyer, "evt_dup"))
                .await
        }));
    }

    let outcomes: Vec<ReconcileOutcome> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("reconcile errored"))
        .collect();

    let granted = outcomes
        .iter()
        .filter(|o| matches!(o, ReconcileOutcome::Granted { .. }))
        .count();
    let benign = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                ReconcileOutcome::Duplicate | ReconcileOutcome::AlreadyOwned { .. }
            )
        })
        .count();
    assert_eq!(granted, 1);
    assert_eq!(benign, 3);

    let stored = store.fetch_lead(lead_id).await.unwrap().unwrap();
    assert_eq!(stored.lead.purchaser_count(), 1);
    assert_eq!(store.ledger_entries().len(), 1);
}
