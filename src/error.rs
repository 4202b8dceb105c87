//! Unified error handling for the payments core.
//!
//! Validation and transition failures are returned to callers as structured
//! values and never thrown past an operation boundary; end users only ever
//! see the generic message from [`PaymentError::user_message`], while the
//! specific error lands in logs and the audit trail.

use crate::cache::error::CacheError;
use crate::database::error::DatabaseError;
use crate::services::status_transition::{PaymentStatus, TransactionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-readable error codes for client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_TRANSACTION_ID")]
    InvalidTransactionId,
    #[serde(rename = "DUPLICATE_TRANSACTION")]
    DuplicateTransaction,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "INVALID_STATUS_TRANSITION")]
    InvalidStatusTransition,
    #[serde(rename = "REFUND_NOT_ALLOWED")]
    RefundNotAllowed,
    #[serde(rename = "INVOICE_SYNC_FAILED")]
    InvoiceSyncFailed,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CACHE_ERROR")]
    CacheError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Errors surfaced by the payment operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Transaction id does not match the `TXN-...` format. Treated as
    /// "not found" by the existence checker, fatal for writes.
    #[error("malformed transaction identifier: {transaction_id}")]
    Format { transaction_id: String },

    /// The transaction id was already registered.
    #[error("transaction {transaction_id} already exists with status {status}")]
    Conflict {
        transaction_id: String,
        status: TransactionStatus,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Illegal edge of the payment status state machine. Not retriable
    /// without operator intervention.
    #[error("invalid payment status transition for {entity} {id}: {from} -> {to}")]
    Transition {
        entity: &'static str,
        id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("order {order_id} is not eligible for refund: {reason}")]
    RefundIneligible { order_id: Uuid, reason: String },

    /// Invoice update failed after its order was already updated. The order
    /// write is never rolled back; this is reported, not propagated.
    #[error("invoice {invoice_id} could not be synchronized: {reason}")]
    Sync { invoice_id: Uuid, reason: String },

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::Format { .. } => ErrorCode::InvalidTransactionId,
            PaymentError::Conflict { .. } => ErrorCode::DuplicateTransaction,
            PaymentError::NotFound { .. } => ErrorCode::NotFound,
            PaymentError::Transition { .. } => ErrorCode::InvalidStatusTransition,
            PaymentError::RefundIneligible { .. } => ErrorCode::RefundNotAllowed,
            PaymentError::Sync { .. } => ErrorCode::InvoiceSyncFailed,
            PaymentError::Database(_) => ErrorCode::DatabaseError,
            PaymentError::Cache(_) => ErrorCode::CacheError,
            PaymentError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Generic message shown to end users; operators get the full error
    /// from logs and the audit trail.
    pub fn user_message(&self) -> &'static str {
        match self {
            PaymentError::Format { .. } | PaymentError::Conflict { .. } => {
                "This payment could not be processed. Please try again."
            }
            PaymentError::NotFound { .. } | PaymentError::Transition { .. } => {
                "The payment could not be updated. Please contact support."
            }
            PaymentError::RefundIneligible { .. } => "This order cannot be refunded.",
            _ => "Something went wrong. Please try again later.",
        }
    }

    /// Whether retrying the same call can ever succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PaymentError::Database(_) | PaymentError::Cache(_) | PaymentError::Internal(_)
        )
    }
}

/// Result alias used across the payment services.
pub type PaymentResult<T> = Result<T, PaymentError>;
