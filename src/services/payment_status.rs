//! Order/invoice payment-status synchronization.
//!
//! The order is authoritative: a status change triggered on the order path
//! is mirrored onto its linked invoice, never the other way around. Every
//! persistent write is gated by the transition validator first; the invoice
//! mirror runs its own validation against the invoice's current state and a
//! rejection there is logged, not rolled back.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::audit_log_repository::AuditEntry;
use crate::error::{PaymentError, PaymentResult};
use crate::services::status_transition::{validate_transition, PaymentStatus};
use crate::services::stores::{AuditSink, InvoiceStore, NotificationSink, OrderStore};

/// Caller-supplied context for a status update.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdateOptions {
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub reason: Option<String>,
    /// Operator/user performing the change, for the audit trail.
    pub actor: Option<Uuid>,
}

/// Outcome of an order-path status update. The order write succeeded;
/// anything that went wrong downstream of it lands in `warnings`.
#[derive(Debug, Clone)]
pub struct StatusUpdateOutcome {
    /// Invoice that accepted the mirrored status, when one was linked.
    pub synced_invoice_id: Option<Uuid>,
    pub warnings: Vec<String>,
}

pub struct PaymentStatusService {
    orders: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceStore>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl PaymentStatusService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceStore>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            orders,
            invoices,
            audit,
            notifications,
        }
    }

    /// Transition an order's payment status, mirroring the change onto its
    /// linked invoice and emitting audit/notification side effects.
    pub async fn update_order_payment_status(
        &self,
        order_id: Uuid,
        new_status: PaymentStatus,
        opts: StatusUpdateOptions,
    ) -> PaymentResult<StatusUpdateOutcome> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        let old_status = order.payment_status_parsed().ok_or_else(|| {
            PaymentError::Internal(format!(
                "order {} has unrecognized payment status {:?}",
                order_id, order.payment_status
            ))
        })?;

        // No persistent write happens on an illegal edge.
        validate_transition("order", &order_id.to_string(), old_status, new_status)?;

        let updated = self
            .orders
            .set_order_payment_status(order_id, new_status, opts.payment_method.as_deref())
            .await?;

        info!(
            order_id = %order_id,
            from = %old_status,
            to = %new_status,
            "order payment status updated"
        );

        // Mirror onto the linked invoice. The invoice validates the edge
        // against its own current state; a rejection is a sync warning, the
        // order write stands. The change is covered by the order's audit
        // entry below rather than a second one.
        let mut synced_invoice_id = None;
        let mut warnings = Vec::new();
        if let Some(invoice) = self.orders.find_invoice_for_order(order_id).await? {
            match self.mirror_invoice_status(&invoice, new_status).await {
                Ok(()) => synced_invoice_id = Some(invoice.id),
                Err(e) => {
                    let sync_err = PaymentError::Sync {
                        invoice_id: invoice.id,
                        reason: e.to_string(),
                    };
                    warn!(
                        order_id = %order_id,
                        error = %sync_err,
                        "invoice synchronization rejected, order update stands"
                    );
                    warnings.push(sync_err.to_string());
                }
            }
        }

        self.audit
            .record(AuditEntry {
                order_id: Some(order_id),
                invoice_id: synced_invoice_id,
                old_status: Some(old_status),
                new_status,
                transaction_id: opts.transaction_id.clone(),
                payment_method: opts.payment_method.clone(),
                metadata: serde_json::json!({}),
                reason: opts.reason.clone(),
                created_by: opts.actor,
            })
            .await;

        match new_status {
            PaymentStatus::Paid => {
                self.notifications
                    .payment_succeeded(&updated, opts.transaction_id.as_deref())
                    .await;
            }
            PaymentStatus::Failed => {
                self.notifications.payment_failed(&updated).await;
            }
            _ => {}
        }

        Ok(StatusUpdateOutcome {
            synced_invoice_id,
            warnings,
        })
    }

    /// One-directional sync of the order's new status onto its invoice,
    /// validated against the invoice's own current state.
    async fn mirror_invoice_status(
        &self,
        invoice: &crate::database::invoice_repository::Invoice,
        new_status: PaymentStatus,
    ) -> PaymentResult<()> {
        let old_status = invoice.payment_status_parsed().ok_or_else(|| {
            PaymentError::Internal(format!(
                "invoice {} has unrecognized payment status {:?}",
                invoice.id, invoice.payment_status
            ))
        })?;

        validate_transition("invoice", &invoice.id.to_string(), old_status, new_status)?;

        self.invoices
            .set_invoice_payment_status(invoice.id, new_status)
            .await?;

        info!(
            invoice_id = %invoice.id,
            from = %old_status,
            to = %new_status,
            "invoice payment status synchronized from order"
        );

        Ok(())
    }

    /// Transition an invoice's payment status. Same validate → write → audit
    /// shape as the order path; `paid_at` is stamped by the store when the
    /// invoice enters `paid`.
    pub async fn update_invoice_payment_status(
        &self,
        invoice_id: Uuid,
        new_status: PaymentStatus,
        opts: StatusUpdateOptions,
    ) -> PaymentResult<()> {
        let invoice = self
            .invoices
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                entity: "invoice",
                id: invoice_id.to_string(),
            })?;

        let old_status = invoice.payment_status_parsed().ok_or_else(|| {
            PaymentError::Internal(format!(
                "invoice {} has unrecognized payment status {:?}",
                invoice_id, invoice.payment_status
            ))
        })?;

        validate_transition("invoice", &invoice_id.to_string(), old_status, new_status)?;

        self.invoices
            .set_invoice_payment_status(invoice_id, new_status)
            .await?;

        info!(
            invoice_id = %invoice_id,
            from = %old_status,
            to = %new_status,
            "invoice payment status updated"
        );

        self.audit
            .record(AuditEntry {
                order_id: Some(invoice.order_id),
                invoice_id: Some(invoice_id),
                old_status: Some(old_status),
                new_status,
                transaction_id: opts.transaction_id,
                payment_method: opts.payment_method,
                metadata: serde_json::json!({}),
                reason: opts.reason,
                created_by: opts.actor,
            })
            .await;

        Ok(())
    }
}
