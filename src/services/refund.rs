//! Refund eligibility and compensation.
//!
//! Refunding an order reverses what the original payment consumed: any
//! gift-card amount recorded on the invoice is credited back exactly once.
//! The already-refunded guard makes the whole operation idempotent — a
//! second refund attempt performs no balance change.

use std::sync::Arc;

use chrono::Utc;
use sqlx::types::BigDecimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::audit_log_repository::AuditEntry;
use crate::error::{PaymentError, PaymentResult};
use crate::services::status_transition::PaymentStatus;
use crate::services::stores::{
    AuditSink, GiftCardStore, InvoiceStore, NotificationSink, OrderStore,
};

/// Answer to "can this order be refunded right now?".
#[derive(Debug, Clone, PartialEq)]
pub struct RefundEligibility {
    pub can_refund: bool,
    pub reason: Option<String>,
}

impl RefundEligibility {
    fn yes() -> Self {
        Self {
            can_refund: true,
            reason: None,
        }
    }

    fn no(reason: impl Into<String>) -> Self {
        Self {
            can_refund: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of a processed refund.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub message: String,
    pub gift_card_restored: bool,
    pub restored_amount: Option<BigDecimal>,
    /// Operator-facing problems that did not stop the refund (e.g. a
    /// missing gift card whose amount could not be restored).
    pub warnings: Vec<String>,
}

pub struct RefundService {
    orders: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceStore>,
    gift_cards: Arc<dyn GiftCardStore>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl RefundService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceStore>,
        gift_cards: Arc<dyn GiftCardStore>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            orders,
            invoices,
            gift_cards,
            audit,
            notifications,
        }
    }

    /// Eligibility check with no side effects.
    pub async fn can_refund_order(&self, order_id: Uuid) -> PaymentResult<RefundEligibility> {
        let Some(order) = self.orders.find_order(order_id).await? else {
            return Ok(RefundEligibility::no("Order not found."));
        };

        match order.payment_status_parsed() {
            Some(PaymentStatus::Refunded) => {
                Ok(RefundEligibility::no("Order has already been refunded."))
            }
            Some(PaymentStatus::Paid) => Ok(RefundEligibility::yes()),
            _ => Ok(RefundEligibility::no(format!(
                "Only paid orders can be refunded (current status: {}).",
                order.payment_status
            ))),
        }
    }

    /// Process a refund: restore any gift-card amount, mark the order
    /// refunded with an appended note, cancel the invoice, and notify.
    pub async fn process_order_refund(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> PaymentResult<RefundOutcome> {
        // Re-fetch under the eligibility rules; financial decisions always
        // re-validate against the authoritative store.
        let eligibility = self.can_refund_order(order_id).await?;
        if !eligibility.can_refund {
            return Err(PaymentError::RefundIneligible {
                order_id,
                reason: eligibility
                    .reason
                    .unwrap_or_else(|| "Refund not allowed.".to_string()),
            });
        }

        let invoice = self.orders.find_invoice_for_order(order_id).await?;
        let mut warnings = Vec::new();
        let mut gift_card = None;
        let mut restored_amount = None;

        // Compensating action: credit back the gift-card amount recorded on
        // the invoice, exactly once. The already-refunded guard above is
        // what prevents a double restore.
        if let Some(inv) = &invoice {
            if let (Some(code), Some(amount)) = (&inv.gift_card_code, &inv.gift_card_amount) {
                if amount > &BigDecimal::from(0) {
                    match self.gift_cards.find_by_code(code).await {
                        Ok(Some(_)) => match self.gift_cards.credit_balance(code, amount).await {
                            Ok(card) => {
                                info!(
                                    order_id = %order_id,
                                    code = %card.code,
                                    amount = %amount,
                                    "gift card balance restored"
                                );
                                restored_amount = Some(amount.clone());
                                gift_card = Some(card);
                            }
                            Err(e) => {
                                warn!(order_id = %order_id, code = %code, error = %e,
                                      "gift card balance restore failed");
                                warnings.push(format!(
                                    "Gift card {code} could not be credited {amount}; restore manually."
                                ));
                            }
                        },
                        Ok(None) => {
                            warn!(order_id = %order_id, code = %code,
                                  "gift card missing during refund");
                            warnings.push(format!(
                                "Gift card {code} not found; {amount} was not restored."
                            ));
                        }
                        Err(e) => {
                            warn!(order_id = %order_id, code = %code, error = %e,
                                  "gift card lookup failed during refund");
                            warnings.push(format!(
                                "Gift card {code} could not be looked up; {amount} was not restored."
                            ));
                        }
                    }
                }
            }
        }

        let updated = self
            .orders
            .set_order_payment_status(order_id, PaymentStatus::Refunded, None)
            .await?;

        let note = match reason {
            Some(reason) => format!(
                "Refunded on {}: {}",
                Utc::now().format("%Y-%m-%d %H:%M UTC"),
                reason
            ),
            None => format!("Refunded on {}", Utc::now().format("%Y-%m-%d %H:%M UTC")),
        };
        if let Err(e) = self.orders.append_order_note(order_id, &note).await {
            warn!(order_id = %order_id, error = %e, "failed to append refund note");
        }

        // Invoices take `cancelled` as their terminal state on the refund
        // path, distinct from the order's `refunded`; this write is outside
        // the transition table on purpose.
        if let Some(inv) = &invoice {
            if let Err(e) = self
                .invoices
                .set_invoice_payment_status(inv.id, PaymentStatus::Cancelled)
                .await
            {
                warn!(
                    order_id = %order_id,
                    invoice_id = %inv.id,
                    error = %e,
                    "failed to cancel invoice during refund"
                );
                warnings.push(format!("Invoice {} could not be cancelled.", inv.id));
            }
        }

        self.audit
            .record(AuditEntry {
                order_id: Some(order_id),
                invoice_id: invoice.as_ref().map(|i| i.id),
                old_status: Some(PaymentStatus::Paid),
                new_status: PaymentStatus::Refunded,
                transaction_id: None,
                payment_method: updated.payment_method.clone(),
                metadata: serde_json::json!({
                    "giftCardRestored": restored_amount.is_some(),
                }),
                reason: reason.map(str::to_string),
                created_by: None,
            })
            .await;

        self.notifications
            .refund_processed(&updated, gift_card.as_ref(), restored_amount.as_ref())
            .await;

        let message = match &restored_amount {
            Some(amount) => format!(
                "Order {} refunded; {} restored to gift card.",
                updated.order_number, amount
            ),
            None => format!("Order {} refunded.", updated.order_number),
        };

        Ok(RefundOutcome {
            message,
            gift_card_restored: restored_amount.is_some(),
            restored_amount,
            warnings,
        })
    }
}
