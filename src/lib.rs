//! Payments core of the Lumenshop storefront backend.
//!
//! Provides the payment-transaction idempotency layer (in-process cache →
//! Redis → Postgres) and the payment-status state machine that keeps
//! orders, invoices, gift cards, audit logs and notifications consistent.
//! The storefront's HTTP layer, auth and rendering pipeline are external
//! collaborators.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod workers;

pub use config::init_logging;
pub use error::{ErrorCode, PaymentError, PaymentResult};
pub use services::{
    generate_transaction_id, is_valid_transaction_id, IdempotencyService, PaymentStatus,
    PaymentStatusService, RefundService, TransactionOutcome, TransactionStatus,
};
