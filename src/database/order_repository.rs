use crate::database::error::DatabaseError;
use crate::database::invoice_repository::Invoice;
use crate::services::status_transition::PaymentStatus;
use crate::services::stores::OrderStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Order entity; the lifecycle root of a purchase. Its payment status is
/// authoritative over the linked invoice's.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Order {
    pub fn payment_status_parsed(&self) -> Option<PaymentStatus> {
        self.payment_status.parse().ok()
    }
}

const ORDER_COLUMNS: &str =
    "id, order_number, user_id, payment_status, payment_method, notes, created_at, updated_at";

/// Repository for the orders table
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Invoice produced by an order, if one exists.
    pub async fn find_invoice(&self, order_id: Uuid) -> Result<Option<Invoice>, DatabaseError> {
        sqlx::query_as::<_, Invoice>(
            "SELECT id, order_id, payment_status, gift_card_code, gift_card_amount, \
                    paid_at, updated_at \
             FROM invoices WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_method: Option<&str>,
    ) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders \
             SET payment_status = $2, \
                 payment_method = COALESCE($3, payment_method), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}",
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(payment_method)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("order", id.to_string()))
    }

    /// Append a line to the order's notes without overwriting prior notes.
    pub async fn append_note(&self, id: Uuid, note: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET notes = CASE WHEN notes IS NULL OR notes = '' THEN $2 \
                              ELSE notes || E'\\n' || $2 END, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("order", id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        self.find_by_id(id).await
    }

    async fn find_invoice_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Invoice>, DatabaseError> {
        self.find_invoice(order_id).await
    }

    async fn set_order_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_method: Option<&str>,
    ) -> Result<Order, DatabaseError> {
        self.update_payment_status(id, status, payment_method).await
    }

    async fn append_order_note(&self, id: Uuid, note: &str) -> Result<(), DatabaseError> {
        self.append_note(id, note).await
    }
}
