//! Full checkout capture: a transaction is registered through the tiered
//! idempotency layer, marked completed, and the order/invoice pair is moved
//! to paid — one flow, both services.

mod common;

use std::sync::Arc;
use std::time::Duration;

use sqlx::types::BigDecimal;
use uuid::Uuid;

use common::{
    FakeCommerceStore, FakeTransactionStore, RecordingAuditSink, RecordingNotificationSink,
};
use lumenshop_backend::cache::memory::InMemoryTransactionCache;
use lumenshop_backend::config::LookupFailurePolicy;
use lumenshop_backend::services::idempotency::{IdempotencyService, RegisterTransaction};
use lumenshop_backend::services::payment_status::{PaymentStatusService, StatusUpdateOptions};
use lumenshop_backend::services::status_transition::{
    PaymentStatus, TransactionOutcome, TransactionStatus,
};
use lumenshop_backend::services::transaction_id::{
    generate_transaction_id, is_valid_transaction_id,
};

#[tokio::test]
async fn checkout_capture_end_to_end() {
    let ttl = Duration::from_secs(24 * 3600);
    let idempotency = IdempotencyService::new(
        Arc::new(InMemoryTransactionCache::new(ttl)),
        Arc::new(InMemoryTransactionCache::new(ttl)),
        Arc::new(FakeTransactionStore::new()),
        LookupFailurePolicy::FailOpen,
    );

    let commerce = Arc::new(FakeCommerceStore::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let notifications = Arc::new(RecordingNotificationSink::new());
    let statuses = PaymentStatusService::new(
        commerce.clone(),
        commerce.clone(),
        audit.clone(),
        notifications.clone(),
    );

    let order_id = Uuid::new_v4();
    commerce.seed_order(common::order(order_id, PaymentStatus::Pending, None));
    let inv = common::invoice(order_id, PaymentStatus::Pending);
    let invoice_id = inv.id;
    commerce.seed_invoice(inv);

    // Client-side: mint an id and register the attempt.
    let txn_id = generate_transaction_id();
    assert!(is_valid_transaction_id(&txn_id));
    idempotency
        .register_transaction(
            &txn_id,
            RegisterTransaction {
                order_id: Some(order_id),
                invoice_id: Some(invoice_id),
                amount: BigDecimal::from(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A duplicate submission of the same id is caught immediately.
    let duplicate = idempotency.check_transaction_exists(&txn_id).await.unwrap();
    assert!(duplicate.exists);
    assert_eq!(duplicate.order_id, Some(order_id));

    // Gateway confirms: the transaction completes, then the order moves
    // through processing to paid.
    idempotency
        .update_transaction_status(&txn_id, TransactionOutcome::Completed, None)
        .await
        .unwrap();

    statuses
        .update_order_payment_status(
            order_id,
            PaymentStatus::Processing,
            StatusUpdateOptions::default(),
        )
        .await
        .unwrap();
    let outcome = statuses
        .update_order_payment_status(
            order_id,
            PaymentStatus::Paid,
            StatusUpdateOptions {
                transaction_id: Some(txn_id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.synced_invoice_id, Some(invoice_id));

    // Final state: transaction completed, order and invoice paid.
    let check = idempotency.check_transaction_exists(&txn_id).await.unwrap();
    assert_eq!(check.status, Some(TransactionStatus::Completed));

    assert_eq!(commerce.order(order_id).unwrap().payment_status, "paid");
    let invoice = commerce.invoice(invoice_id).unwrap();
    assert_eq!(invoice.payment_status, "paid");
    assert!(invoice.paid_at.is_some());

    // Two transitions, two audit entries; the paid one carries the
    // transaction id. Exactly one success notification went out.
    assert_eq!(audit.count(), 2);
    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries[1].transaction_id.as_deref(), Some(txn_id.as_str()));
    assert_eq!(entries[1].new_status, PaymentStatus::Paid);
    drop(entries);

    assert_eq!(
        notifications.events(),
        vec![format!("payment_success:{order_id}")]
    );
}
