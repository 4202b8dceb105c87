//! Payment status state machine shared by orders and invoices.
//!
//! The transition table is the single authority on which status changes are
//! legal. It is pure (no I/O) and must be consulted before any persistent
//! write; an illegal edge is rejected naming both endpoints and is not
//! retriable without operator intervention.

use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment status carried by orders and invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable from `self` in one step.
    pub fn allowed_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[
                PaymentStatus::Processing,
                PaymentStatus::Paid,
                PaymentStatus::Failed,
                PaymentStatus::Cancelled,
            ],
            PaymentStatus::Processing => &[
                PaymentStatus::Paid,
                PaymentStatus::Failed,
                PaymentStatus::Cancelled,
            ],
            PaymentStatus::Paid => &[PaymentStatus::Refunded],
            PaymentStatus::Failed => &[PaymentStatus::Pending, PaymentStatus::Cancelled],
            // Terminal states.
            PaymentStatus::Refunded | PaymentStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status flag on a payment transaction record.
///
/// Deliberately simpler than [`PaymentStatus`]: a transaction starts
/// `pending` and moves once to a terminal outcome, with no transition
/// validation applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Terminal outcome accepted by the transaction status updater.
///
/// `pending` is set only at registration and cannot be re-entered, so the
/// updater takes this two-variant type instead of [`TransactionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Completed,
    Failed,
}

impl From<TransactionOutcome> for TransactionStatus {
    fn from(outcome: TransactionOutcome) -> Self {
        match outcome {
            TransactionOutcome::Completed => TransactionStatus::Completed,
            TransactionOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// A status string that is not part of the model.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownStatus(pub String);

/// Whether `from -> to` is a legal edge of the state machine.
pub fn is_transition_allowed(from: PaymentStatus, to: PaymentStatus) -> bool {
    from.allowed_transitions().contains(&to)
}

/// Validate a transition for a concrete entity, producing the structured
/// error the caller surfaces when the edge is illegal.
pub fn validate_transition(
    entity: &'static str,
    id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<(), PaymentError> {
    if is_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(PaymentError::Transition {
            entity,
            id: id.to_string(),
            from,
            to,
        })
    }
}
