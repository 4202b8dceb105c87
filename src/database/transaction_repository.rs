use crate::database::error::DatabaseError;
use crate::services::status_transition::TransactionStatus;
use crate::services::stores::TransactionStore;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Payment transaction entity; the authoritative idempotency record.
///
/// Rows are created `pending`, mutated once to a terminal status, and never
/// deleted by the primary flow (only cache tiers are evicted).
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub user_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRecord {
    /// Parsed status flag; unknown strings written by older clients read as
    /// `pending` so they stay visible to the duplicate check.
    pub fn status_flag(&self) -> TransactionStatus {
        self.status.parse().unwrap_or(TransactionStatus::Pending)
    }
}

/// Fields required to register a new transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub currency: String,
    pub user_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

const RECORD_COLUMNS: &str = "transaction_id, order_id, invoice_id, status, amount, currency, \
                              user_id, metadata, created_at, completed_at, updated_at";

/// Repository for the payment_transactions table
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` transaction. A duplicate transaction id
    /// surfaces as a unique violation; the caller decides what a lost
    /// registration race means.
    pub async fn create_pending(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionRecord, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(
            "INSERT INTO payment_transactions \
             (transaction_id, order_id, invoice_id, status, amount, currency, user_id, metadata) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7) \
             RETURNING transaction_id, order_id, invoice_id, status, amount, currency, \
                       user_id, metadata, created_at, completed_at, updated_at",
        )
        .bind(&input.transaction_id)
        .bind(input.order_id)
        .bind(input.invoice_id)
        .bind(&input.amount)
        .bind(&input.currency)
        .bind(input.user_id)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a transaction by its id.
    pub async fn find_by_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionRecord>, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_transactions WHERE transaction_id = $1",
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Move a transaction to a terminal status, merging any metadata and
    /// stamping `completed_at` on completion.
    pub async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        additional_metadata: Option<serde_json::Value>,
    ) -> Result<Option<TransactionRecord>, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(
            "UPDATE payment_transactions \
             SET status = $2, \
                 metadata = metadata || COALESCE($3, '{}'::jsonb), \
                 completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE transaction_id = $1 \
             RETURNING transaction_id, order_id, invoice_id, status, amount, currency, \
                       user_id, metadata, created_at, completed_at, updated_at",
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(additional_metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find transactions attached to an order.
    pub async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_transactions \
             WHERE order_id = $1 ORDER BY created_at DESC",
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn find(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, DatabaseError> {
        self.find_by_id(transaction_id).await
    }

    async fn insert_pending(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionRecord, DatabaseError> {
        self.create_pending(input).await
    }

    async fn mark_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<TransactionRecord>, DatabaseError> {
        self.update_status(transaction_id, status, metadata).await
    }
}
