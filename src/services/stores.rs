//! Trait seams between the payment services and their storage/side-effect
//! collaborators. Production wiring uses the sqlx repositories; tests use
//! in-memory fakes.

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::database::audit_log_repository::AuditEntry;
use crate::database::error::DatabaseError;
use crate::database::gift_card_repository::GiftCard;
use crate::database::invoice_repository::Invoice;
use crate::database::order_repository::Order;
use crate::database::transaction_repository::{NewTransaction, TransactionRecord};
use crate::services::status_transition::{PaymentStatus, TransactionStatus};

/// Authoritative store of payment transactions (idempotency records).
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, DatabaseError>;

    async fn insert_pending(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionRecord, DatabaseError>;

    /// Returns `None` when no row with that id exists.
    async fn mark_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<TransactionRecord>, DatabaseError>;
}

/// Order access used by the synchronizer and the refund engine.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError>;

    async fn find_invoice_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Invoice>, DatabaseError>;

    async fn set_order_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_method: Option<&str>,
    ) -> Result<Order, DatabaseError>;

    async fn append_order_note(&self, id: Uuid, note: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, DatabaseError>;

    /// Implementations stamp `paid_at` when the status becomes `paid`.
    async fn set_invoice_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Invoice, DatabaseError>;
}

#[async_trait]
pub trait GiftCardStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<GiftCard>, DatabaseError>;

    async fn credit_balance(
        &self,
        code: &str,
        amount: &BigDecimal,
    ) -> Result<GiftCard, DatabaseError>;
}

/// Best-effort audit recorder. Implementations must never fail the caller;
/// a write failure degrades to a log line.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Best-effort notification dispatch. Failures are logged, never re-thrown.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn payment_succeeded(&self, order: &Order, transaction_id: Option<&str>);

    async fn payment_failed(&self, order: &Order);

    async fn refund_processed(
        &self,
        order: &Order,
        gift_card: Option<&GiftCard>,
        restored_amount: Option<&BigDecimal>,
    );
}
