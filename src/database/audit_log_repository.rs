use crate::database::error::DatabaseError;
use crate::services::status_transition::PaymentStatus;
use sqlx::PgPool;
use uuid::Uuid;

/// One append-only audit record of a payment status change.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub old_status: Option<PaymentStatus>,
    pub new_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub metadata: serde_json::Value,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Repository for the payment_audit_logs table.
///
/// The table is optional per deployment; callers check
/// [`DatabaseError::is_undefined_table`] and degrade to a log line.
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO payment_audit_logs \
             (order_id, invoice_id, old_status, new_status, transaction_id, \
              payment_method, metadata, reason, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.order_id)
        .bind(entry.invoice_id)
        .bind(entry.old_status.map(|s| s.as_str()))
        .bind(entry.new_status.as_str())
        .bind(&entry.transaction_id)
        .bind(&entry.payment_method)
        .bind(&entry.metadata)
        .bind(&entry.reason)
        .bind(entry.created_by)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
