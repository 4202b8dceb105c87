//! Services module for the payment engine's business logic

pub mod audit;
pub mod idempotency;
pub mod notification;
pub mod payment_status;
pub mod refund;
pub mod status_transition;
pub mod stores;
pub mod transaction_id;

pub use idempotency::{IdempotencyService, RegisterTransaction, TransactionCheck};
pub use payment_status::{PaymentStatusService, StatusUpdateOptions, StatusUpdateOutcome};
pub use refund::{RefundEligibility, RefundOutcome, RefundService};
pub use status_transition::{
    is_transition_allowed, validate_transition, PaymentStatus, TransactionOutcome,
    TransactionStatus,
};
pub use transaction_id::{
    canonical_transaction_id, generate_transaction_id, is_valid_transaction_id,
};
