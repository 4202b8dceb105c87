//! Integration tests for the tiered transaction idempotency layer, run
//! against in-memory cache tiers and a fake authoritative store.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use common::FakeTransactionStore;
use lumenshop_backend::cache::keys::transaction::RecordKey;
use lumenshop_backend::cache::memory::InMemoryTransactionCache;
use lumenshop_backend::cache::{CachedTransaction, TransactionCache};
use lumenshop_backend::config::LookupFailurePolicy;
use lumenshop_backend::database::transaction_repository::NewTransaction;
use lumenshop_backend::error::PaymentError;
use lumenshop_backend::services::idempotency::{IdempotencyService, RegisterTransaction};
use lumenshop_backend::services::status_transition::{TransactionOutcome, TransactionStatus};
use lumenshop_backend::services::stores::TransactionStore;

// Already in canonical (upper-cased) form so it can double as the store key.
const TXN_ID: &str = "TXN-1700000000000-ABC123-DEF45678";

struct Harness {
    memory: Arc<InMemoryTransactionCache>,
    durable: Arc<InMemoryTransactionCache>,
    store: Arc<FakeTransactionStore>,
    service: IdempotencyService,
}

fn harness(policy: LookupFailurePolicy) -> Harness {
    let ttl = Duration::from_secs(24 * 3600);
    let memory = Arc::new(InMemoryTransactionCache::new(ttl));
    let durable = Arc::new(InMemoryTransactionCache::new(ttl));
    let store = Arc::new(FakeTransactionStore::new());
    let service = IdempotencyService::new(
        memory.clone(),
        durable.clone(),
        store.clone(),
        policy,
    );
    Harness {
        memory,
        durable,
        store,
        service,
    }
}

fn register_input(order_id: Uuid) -> RegisterTransaction {
    RegisterTransaction {
        order_id: Some(order_id),
        amount: BigDecimal::from(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn register_then_check_reports_pending() {
    let h = harness(LookupFailurePolicy::FailOpen);
    let order_id = Uuid::new_v4();

    let before = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(!before.exists);
    assert!(before.message.is_none());

    h.service
        .register_transaction(TXN_ID, register_input(order_id))
        .await
        .unwrap();

    let after = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(after.exists);
    assert_eq!(after.status, Some(TransactionStatus::Pending));
    assert_eq!(after.order_id, Some(order_id));

    // The authoritative store holds the canonical (upper-cased) id.
    assert!(h.store.get(TXN_ID).is_some());
}

#[tokio::test]
async fn duplicate_registration_conflicts_with_first_status() {
    let h = harness(LookupFailurePolicy::FailOpen);
    let order_id = Uuid::new_v4();

    h.service
        .register_transaction(TXN_ID, register_input(order_id))
        .await
        .unwrap();

    let err = h
        .service
        .register_transaction(TXN_ID, register_input(order_id))
        .await
        .unwrap_err();
    match err {
        PaymentError::Conflict {
            transaction_id,
            status,
        } => {
            assert_eq!(transaction_id, TXN_ID);
            assert_eq!(status, TransactionStatus::Pending);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }

    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn status_update_is_visible_from_every_tier() {
    let h = harness(LookupFailurePolicy::FailOpen);
    let order_id = Uuid::new_v4();
    let key = RecordKey::new(TXN_ID).to_string();

    h.service
        .register_transaction(TXN_ID, register_input(order_id))
        .await
        .unwrap();
    h.service
        .update_transaction_status(TXN_ID, TransactionOutcome::Completed, None)
        .await
        .unwrap();

    // Fastest tier answers first.
    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert_eq!(check.status, Some(TransactionStatus::Completed));
    assert_eq!(check.order_id, Some(order_id));

    // Evict the in-process tier; the durable tier answers and promotes.
    h.memory.evict(&key).await.unwrap();
    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert_eq!(check.status, Some(TransactionStatus::Completed));
    assert!(h.memory.get(&key).await.unwrap().is_some());

    // Evict both cache tiers; the authoritative store answers and both
    // caches are refreshed.
    h.memory.evict(&key).await.unwrap();
    h.durable.evict(&key).await.unwrap();
    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert_eq!(check.status, Some(TransactionStatus::Completed));
    assert!(h.durable.get(&key).await.unwrap().is_some());

    let record = h.store.get(TXN_ID).unwrap();
    assert_eq!(record.status, "completed");
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn promotion_preserves_the_original_timestamp() {
    let h = harness(LookupFailurePolicy::FailOpen);
    let key = RecordKey::new(TXN_ID).to_string();

    let mut entry = CachedTransaction::new(TransactionStatus::Pending, None, None);
    entry.timestamp = Utc::now() - chrono::Duration::hours(3);
    h.durable.set(&key, &entry).await.unwrap();

    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(check.exists);

    let promoted = h.memory.get(&key).await.unwrap().unwrap();
    assert_eq!(promoted.timestamp, entry.timestamp);
}

#[tokio::test]
async fn cleanup_evicts_stale_entries_and_keeps_fresh_ones() {
    let h = harness(LookupFailurePolicy::FailOpen);

    let mut stale = CachedTransaction::new(TransactionStatus::Completed, None, None);
    stale.timestamp = Utc::now() - chrono::Duration::hours(25);
    let mut fresh = CachedTransaction::new(TransactionStatus::Pending, None, None);
    fresh.timestamp = Utc::now() - chrono::Duration::hours(1);

    for tier in [&h.memory, &h.durable] {
        tier.set("txn_STALE", &stale).await.unwrap();
        tier.set("txn_FRESH", &fresh).await.unwrap();
    }

    h.service.cleanup_old_transactions().await;

    for tier in [&h.memory, &h.durable] {
        assert!(tier.get("txn_STALE").await.unwrap().is_none());
        assert!(tier.get("txn_FRESH").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn fail_open_treats_store_outage_as_a_miss_with_message() {
    let h = harness(LookupFailurePolicy::FailOpen);
    h.store.fail_reads.store(true, Ordering::SeqCst);

    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(!check.exists);
    assert!(check.message.is_some());
}

#[tokio::test]
async fn fail_closed_surfaces_the_store_outage() {
    let h = harness(LookupFailurePolicy::FailClosed);
    h.store.fail_reads.store(true, Ordering::SeqCst);

    let err = h.service.check_transaction_exists(TXN_ID).await.unwrap_err();
    assert!(matches!(err, PaymentError::Database(_)));
}

#[tokio::test]
async fn remote_write_failure_keeps_the_local_registration() {
    let h = harness(LookupFailurePolicy::FailOpen);
    h.store.fail_reads.store(true, Ordering::SeqCst);
    h.store.fail_writes.store(true, Ordering::SeqCst);

    // Registration succeeds anyway; the local tiers now carry the record.
    h.service
        .register_transaction(TXN_ID, register_input(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(h.store.len(), 0);

    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(check.exists);
    assert_eq!(check.status, Some(TransactionStatus::Pending));
}

#[tokio::test]
async fn malformed_id_is_a_miss_on_check_and_an_error_on_writes() {
    let h = harness(LookupFailurePolicy::FailOpen);

    let check = h
        .service
        .check_transaction_exists("not-a-transaction")
        .await
        .unwrap();
    assert!(!check.exists);
    assert!(check.message.unwrap().contains("malformed"));

    let err = h
        .service
        .register_transaction("not-a-transaction", RegisterTransaction::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Format { .. }));

    let err = h
        .service
        .update_transaction_status("not-a-transaction", TransactionOutcome::Failed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Format { .. }));
}

#[tokio::test]
async fn lost_insert_race_resolves_to_conflict() {
    let h = harness(LookupFailurePolicy::FailOpen);
    let winner_order = Uuid::new_v4();
    let loser_order = Uuid::new_v4();

    // Another session registered and completed the id; our caches know
    // nothing about it.
    let seeded = h
        .store
        .insert_pending(&NewTransaction {
            transaction_id: TXN_ID.to_string(),
            order_id: Some(winner_order),
            invoice_id: None,
            amount: BigDecimal::from(10),
            currency: "USD".to_string(),
            user_id: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    h.store
        .mark_status(&seeded.transaction_id, TransactionStatus::Completed, None)
        .await
        .unwrap();

    // Open the race window: the existence check inside the registrar sees a
    // miss, the insert then trips the unique constraint, and the follow-up
    // read reports the winner's status.
    h.store.miss_next_finds.store(1, Ordering::SeqCst);

    let err = h
        .service
        .register_transaction(TXN_ID, register_input(loser_order))
        .await
        .unwrap_err();
    match err {
        PaymentError::Conflict { status, .. } => {
            assert_eq!(status, TransactionStatus::Completed)
        }
        other => panic!("expected Conflict, got {other:?}"),
    }

    // The losing registration wrote pending entries with its own order link
    // into the local tiers; after the conflict every tier must answer with
    // the winner's record instead.
    let key = RecordKey::new(TXN_ID).to_string();
    let cached = h.memory.get(&key).await.unwrap().unwrap();
    assert_eq!(cached.status, TransactionStatus::Completed);
    assert_eq!(cached.order_id, Some(winner_order));

    let check = h.service.check_transaction_exists(TXN_ID).await.unwrap();
    assert!(check.exists);
    assert_eq!(check.status, Some(TransactionStatus::Completed));
    assert_eq!(check.order_id, Some(winner_order));
}

#[tokio::test]
async fn lost_race_with_unreadable_winner_drops_the_loser_entries() {
    let h = harness(LookupFailurePolicy::FailOpen);

    h.store
        .insert_pending(&NewTransaction {
            transaction_id: TXN_ID.to_string(),
            order_id: None,
            invoice_id: None,
            amount: BigDecimal::from(10),
            currency: "USD".to_string(),
            user_id: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    // Both the pre-insert check and the post-conflict re-read miss, so the
    // service cannot learn the winner's state and must not keep the loser's.
    h.store.miss_next_finds.store(2, Ordering::SeqCst);

    let err = h
        .service
        .register_transaction(TXN_ID, register_input(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Conflict { .. }));

    let key = RecordKey::new(TXN_ID).to_string();
    assert!(h.memory.get(&key).await.unwrap().is_none());
    assert!(h.durable.get(&key).await.unwrap().is_none());
}
