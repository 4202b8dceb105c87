//! In-app and email notification dispatch.
//!
//! Side effects only: every method is best-effort and failures are logged,
//! never re-thrown into the payment flow. Email delivery itself is an
//! external collaborator behind [`EmailDispatcher`].

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::gift_card_repository::GiftCard;
use crate::database::notification_repository::{NewNotification, NotificationRepository};
use crate::database::order_repository::Order;
use crate::services::stores::NotificationSink;

/// Outbound email collaborator. The storefront's rendering/delivery
/// pipeline lives elsewhere; this crate only hands it a subject and body.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, user_id: Uuid, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default dispatcher used when no delivery pipeline is wired up.
pub struct LogEmailDispatcher;

#[async_trait]
impl EmailDispatcher for LogEmailDispatcher {
    async fn send(&self, user_id: Uuid, subject: &str, _body: &str) -> anyhow::Result<()> {
        info!(user_id = %user_id, subject = %subject, "email dispatch (log only)");
        Ok(())
    }
}

pub struct NotificationService {
    repo: NotificationRepository,
    email: Box<dyn EmailDispatcher>,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, email: Box<dyn EmailDispatcher>) -> Self {
        Self { repo, email }
    }

    async fn push(&self, notification: NewNotification) {
        if let Err(e) = self.repo.insert(&notification).await {
            warn!(
                user_id = %notification.user_id,
                kind = %notification.kind,
                error = %e,
                "failed to insert notification"
            );
        }
    }

    async fn send_email(&self, user_id: Uuid, subject: &str, body: &str) {
        if let Err(e) = self.email.send(user_id, subject, body).await {
            warn!(user_id = %user_id, error = %e, "email dispatch failed");
        }
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn payment_succeeded(&self, order: &Order, transaction_id: Option<&str>) {
        let Some(user_id) = order.user_id else { return };

        self.push(NewNotification {
            user_id,
            kind: "payment_success".to_string(),
            title: "Payment received".to_string(),
            message: format!("Your payment for order {} was received.", order.order_number),
            link: Some(format!("/orders/{}", order.id)),
        })
        .await;

        let body = match transaction_id {
            Some(txn) => format!(
                "Payment for order {} confirmed (reference {}).",
                order.order_number, txn
            ),
            None => format!("Payment for order {} confirmed.", order.order_number),
        };
        self.send_email(user_id, "Your payment was received", &body)
            .await;
    }

    async fn payment_failed(&self, order: &Order) {
        let Some(user_id) = order.user_id else { return };

        // In-app only for failures.
        self.push(NewNotification {
            user_id,
            kind: "payment_failed".to_string(),
            title: "Payment failed".to_string(),
            message: format!(
                "Your payment for order {} could not be processed.",
                order.order_number
            ),
            link: Some(format!("/orders/{}", order.id)),
        })
        .await;
    }

    async fn refund_processed(
        &self,
        order: &Order,
        gift_card: Option<&GiftCard>,
        restored_amount: Option<&BigDecimal>,
    ) {
        if let Some(user_id) = order.user_id {
            let message = match restored_amount {
                Some(amount) => format!(
                    "Your order {} was refunded. {} was returned to your gift card.",
                    order.order_number, amount
                ),
                None => format!("Your order {} was refunded.", order.order_number),
            };
            self.push(NewNotification {
                user_id,
                kind: "order_refunded".to_string(),
                title: "Order refunded".to_string(),
                message,
                link: Some(format!("/orders/{}", order.id)),
            })
            .await;
        }

        // Gift-card recipient, when resolvable to an account.
        if let (Some(card), Some(amount)) = (gift_card, restored_amount) {
            if let Some(email) = card.recipient_email.as_deref() {
                match self.repo.find_user_id_by_email(email).await {
                    Ok(Some(recipient_id)) => {
                        self.push(NewNotification {
                            user_id: recipient_id,
                            kind: "gift_card_credited".to_string(),
                            title: "Gift card balance restored".to_string(),
                            message: format!(
                                "{} was restored to gift card {}.",
                                amount, card.code
                            ),
                            link: Some("/account/gift-cards".to_string()),
                        })
                        .await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "gift-card recipient lookup failed");
                    }
                }
            }
        }

        // Operator fan-out.
        match self.repo.find_admin_user_ids().await {
            Ok(admin_ids) => {
                for admin_id in admin_ids {
                    self.push(NewNotification {
                        user_id: admin_id,
                        kind: "order_refunded".to_string(),
                        title: "Order refunded".to_string(),
                        message: format!("Order {} was refunded.", order.order_number),
                        link: Some(format!("/admin/orders/{}", order.id)),
                    })
                    .await;
                }
            }
            Err(e) => {
                warn!(error = %e, "admin lookup for refund notification failed");
            }
        }
    }
}
