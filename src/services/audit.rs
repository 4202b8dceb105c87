//! Best-effort payment audit trail.
//!
//! The audit table is optional per deployment; a missing table or any other
//! write failure degrades to a log line and never blocks the status change
//! being recorded.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::database::audit_log_repository::{AuditEntry, AuditLogRepository};
use crate::services::stores::AuditSink;

pub struct PaymentAuditService {
    repo: AuditLogRepository,
}

impl PaymentAuditService {
    pub fn new(repo: AuditLogRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl AuditSink for PaymentAuditService {
    async fn record(&self, entry: AuditEntry) {
        match self.repo.append(&entry).await {
            Ok(()) => {
                debug!(
                    order_id = ?entry.order_id,
                    invoice_id = ?entry.invoice_id,
                    new_status = %entry.new_status,
                    "payment audit entry recorded"
                );
            }
            Err(e) if e.is_undefined_table() => {
                warn!(
                    order_id = ?entry.order_id,
                    old_status = ?entry.old_status.map(|s| s.as_str()),
                    new_status = %entry.new_status,
                    "payment_audit_logs table missing, audit entry logged only"
                );
            }
            Err(e) => {
                warn!(
                    order_id = ?entry.order_id,
                    error = %e,
                    "failed to record payment audit entry"
                );
            }
        }
    }
}
