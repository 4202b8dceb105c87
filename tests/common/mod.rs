//! In-memory fakes for the store and sink traits, shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use lumenshop_backend::database::audit_log_repository::AuditEntry;
use lumenshop_backend::database::error::{DatabaseError, DatabaseErrorKind};
use lumenshop_backend::database::gift_card_repository::GiftCard;
use lumenshop_backend::database::invoice_repository::Invoice;
use lumenshop_backend::database::order_repository::Order;
use lumenshop_backend::database::transaction_repository::{NewTransaction, TransactionRecord};
use lumenshop_backend::services::status_transition::{PaymentStatus, TransactionStatus};
use lumenshop_backend::services::stores::{
    AuditSink, GiftCardStore, InvoiceStore, NotificationSink, OrderStore, TransactionStore,
};

fn connection_error() -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Connection {
        message: "simulated outage".to_string(),
    })
}

/// Authoritative transaction store backed by a map, with switches to
/// simulate outages and lost registration races.
#[derive(Default)]
pub struct FakeTransactionStore {
    records: Mutex<HashMap<String, TransactionRecord>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Makes the next N `find` calls report a miss, to open a race window
    /// between the existence check and the insert.
    pub miss_next_finds: AtomicUsize,
}

impl FakeTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: TransactionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.transaction_id.clone(), record);
    }

    pub fn get(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.records.lock().unwrap().get(transaction_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionStore for FakeTransactionStore {
    async fn find(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, DatabaseError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(connection_error());
        }
        if self
            .miss_next_finds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(None);
        }
        Ok(self.get(transaction_id))
    }

    async fn insert_pending(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionRecord, DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(connection_error());
        }

        let mut records = self.records.lock().unwrap();
        if records.contains_key(&input.transaction_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: "payment_transactions_pkey".to_string(),
            }));
        }

        let record = TransactionRecord {
            transaction_id: input.transaction_id.clone(),
            order_id: input.order_id,
            invoice_id: input.invoice_id,
            status: "pending".to_string(),
            amount: input.amount.clone(),
            currency: input.currency.clone(),
            user_id: input.user_id,
            metadata: input.metadata.clone(),
            created_at: Utc::now(),
            completed_at: None,
            updated_at: Utc::now(),
        };
        records.insert(record.transaction_id.clone(), record.clone());
        Ok(record)
    }

    async fn mark_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<TransactionRecord>, DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(connection_error());
        }

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(transaction_id) else {
            return Ok(None);
        };

        record.status = status.as_str().to_string();
        if status == TransactionStatus::Completed {
            record.completed_at = Some(Utc::now());
        }
        if let Some(extra) = metadata {
            if let (Some(base), Some(patch)) = (record.metadata.as_object_mut(), extra.as_object())
            {
                for (k, v) in patch {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}

/// Orders, invoices and gift cards in one fake backend.
#[derive(Default)]
pub struct FakeCommerceStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    invoices: Mutex<HashMap<Uuid, Invoice>>,
    gift_cards: Mutex<HashMap<String, GiftCard>>,
}

impl FakeCommerceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn seed_invoice(&self, invoice: Invoice) {
        self.invoices.lock().unwrap().insert(invoice.id, invoice);
    }

    pub fn seed_gift_card(&self, card: GiftCard) {
        self.gift_cards.lock().unwrap().insert(card.code.clone(), card);
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.orders.lock().unwrap().get(&id).cloned()
    }

    pub fn invoice(&self, id: Uuid) -> Option<Invoice> {
        self.invoices.lock().unwrap().get(&id).cloned()
    }

    pub fn gift_card(&self, code: &str) -> Option<GiftCard> {
        self.gift_cards.lock().unwrap().get(code).cloned()
    }
}

#[async_trait]
impl OrderStore for FakeCommerceStore {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        Ok(self.order(id))
    }

    async fn find_invoice_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Invoice>, DatabaseError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .values()
            .find(|i| i.order_id == order_id)
            .cloned())
    }

    async fn set_order_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_method: Option<&str>,
    ) -> Result<Order, DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("order", id.to_string()))?;
        order.payment_status = status.as_str().to_string();
        if let Some(method) = payment_method {
            order.payment_method = Some(method.to_string());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn append_order_note(&self, id: Uuid, note: &str) -> Result<(), DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("order", id.to_string()))?;
        order.notes = match order.notes.take() {
            Some(existing) if !existing.is_empty() => Some(format!("{existing}\n{note}")),
            _ => Some(note.to_string()),
        };
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for FakeCommerceStore {
    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, DatabaseError> {
        Ok(self.invoice(id))
    }

    async fn set_invoice_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Invoice, DatabaseError> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("invoice", id.to_string()))?;
        invoice.payment_status = status.as_str().to_string();
        if status == PaymentStatus::Paid && invoice.paid_at.is_none() {
            invoice.paid_at = Some(Utc::now());
        }
        invoice.updated_at = Utc::now();
        Ok(invoice.clone())
    }
}

#[async_trait]
impl GiftCardStore for FakeCommerceStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<GiftCard>, DatabaseError> {
        Ok(self.gift_card(code))
    }

    async fn credit_balance(
        &self,
        code: &str,
        amount: &BigDecimal,
    ) -> Result<GiftCard, DatabaseError> {
        let mut cards = self.gift_cards.lock().unwrap();
        let card = cards
            .get_mut(code)
            .ok_or_else(|| DatabaseError::not_found("gift card", code.to_string()))?;
        card.current_balance = &card.current_balance + amount;
        card.updated_at = Utc::now();
        Ok(card.clone())
    }
}

/// Records audit entries for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, entry: AuditEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Records notification events as `kind:order_id` strings.
#[derive(Default)]
pub struct RecordingNotificationSink {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn payment_succeeded(&self, order: &Order, _transaction_id: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("payment_success:{}", order.id));
    }

    async fn payment_failed(&self, order: &Order) {
        self.events
            .lock()
            .unwrap()
            .push(format!("payment_failed:{}", order.id));
    }

    async fn refund_processed(
        &self,
        order: &Order,
        _gift_card: Option<&GiftCard>,
        restored_amount: Option<&BigDecimal>,
    ) {
        let suffix = restored_amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.events
            .lock()
            .unwrap()
            .push(format!("refund:{}:{}", order.id, suffix));
    }
}

/// Builders for seeded entities.
pub fn order(id: Uuid, status: PaymentStatus, user_id: Option<Uuid>) -> Order {
    Order {
        id,
        order_number: format!("LS-{}", &id.to_string()[..8]),
        user_id,
        payment_status: status.as_str().to_string(),
        payment_method: None,
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn invoice(order_id: Uuid, status: PaymentStatus) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        order_id,
        payment_status: status.as_str().to_string(),
        gift_card_code: None,
        gift_card_amount: None,
        paid_at: None,
        updated_at: Utc::now(),
    }
}

pub fn gift_card(code: &str, balance: BigDecimal) -> GiftCard {
    GiftCard {
        id: Uuid::new_v4(),
        code: code.to_string(),
        current_balance: balance,
        recipient_email: Some("recipient@example.com".to_string()),
        updated_at: Utc::now(),
    }
}
