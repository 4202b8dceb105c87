use crate::database::error::DatabaseError;
use crate::services::status_transition::PaymentStatus;
use crate::services::stores::InvoiceStore;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Invoice entity. Carries its own payment status, kept in sync from the
/// order side; `gift_card_code`/`gift_card_amount` record how much of the
/// invoice was settled via a gift card.
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_status: String,
    pub gift_card_code: Option<String>,
    pub gift_card_amount: Option<BigDecimal>,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Invoice {
    pub fn payment_status_parsed(&self) -> Option<PaymentStatus> {
        self.payment_status.parse().ok()
    }
}

const INVOICE_COLUMNS: &str =
    "id, order_id, payment_status, gift_card_code, gift_card_amount, paid_at, updated_at";

/// Repository for the invoices table
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, DatabaseError> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Update the invoice's payment status, stamping `paid_at` when it
    /// enters `paid`.
    pub async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Invoice, DatabaseError> {
        sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices \
             SET payment_status = $2, \
                 paid_at = CASE WHEN $2 = 'paid' THEN NOW() ELSE paid_at END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {INVOICE_COLUMNS}",
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("invoice", id.to_string()))
    }
}

#[async_trait]
impl InvoiceStore for InvoiceRepository {
    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, DatabaseError> {
        self.find_by_id(id).await
    }

    async fn set_invoice_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Invoice, DatabaseError> {
        self.update_payment_status(id, status).await
    }
}
