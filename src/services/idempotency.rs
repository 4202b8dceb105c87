//! Tiered transaction idempotency: existence check, registrar, status
//! updater and cache cleanup.
//!
//! Lookup order is strict — in-process cache, durable Redis tier, then the
//! authoritative datastore — short-circuiting on the first hit. The tiers
//! are a cache-aside optimization; the datastore's uniqueness constraint
//! remains the final arbiter when two sessions race on the same id.

use std::sync::Arc;

use sqlx::types::BigDecimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::keys::transaction::RecordKey;
use crate::cache::{CachedTransaction, TransactionCache};
use crate::config::LookupFailurePolicy;
use crate::error::{PaymentError, PaymentResult};
use crate::services::status_transition::{TransactionOutcome, TransactionStatus};
use crate::services::stores::TransactionStore;
use crate::services::transaction_id::{canonical_transaction_id, is_valid_transaction_id};
use crate::database::transaction_repository::NewTransaction;

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCheck {
    pub exists: bool,
    pub status: Option<TransactionStatus>,
    pub order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    /// Set when the check degraded (malformed id, remote lookup skipped).
    pub message: Option<String>,
}

impl TransactionCheck {
    fn miss(message: Option<String>) -> Self {
        Self {
            exists: false,
            status: None,
            order_id: None,
            invoice_id: None,
            message,
        }
    }

    fn hit(entry: &CachedTransaction) -> Self {
        Self {
            exists: true,
            status: Some(entry.status),
            order_id: entry.order_id,
            invoice_id: entry.invoice_id,
            message: None,
        }
    }
}

/// Fields accepted when registering a transaction.
#[derive(Debug, Clone, Default)]
pub struct RegisterTransaction {
    pub order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub user_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

pub struct IdempotencyService {
    memory: Arc<dyn TransactionCache>,
    durable: Arc<dyn TransactionCache>,
    store: Arc<dyn TransactionStore>,
    lookup_failure_policy: LookupFailurePolicy,
}

impl IdempotencyService {
    pub fn new(
        memory: Arc<dyn TransactionCache>,
        durable: Arc<dyn TransactionCache>,
        store: Arc<dyn TransactionStore>,
        lookup_failure_policy: LookupFailurePolicy,
    ) -> Self {
        Self {
            memory,
            durable,
            store,
            lookup_failure_policy,
        }
    }

    /// Check whether a transaction id has already been seen.
    ///
    /// A malformed id reports `exists = false` with a message: it cannot
    /// collide with a real record, so callers may proceed. Behavior when the
    /// authoritative lookup fails is governed by the configured policy.
    pub async fn check_transaction_exists(&self, id: &str) -> PaymentResult<TransactionCheck> {
        if !is_valid_transaction_id(id) {
            return Ok(TransactionCheck::miss(Some(format!(
                "malformed transaction id: {id}"
            ))));
        }

        let key = RecordKey::new(id).to_string();

        match self.memory.get(&key).await {
            Ok(Some(entry)) => return Ok(TransactionCheck::hit(&entry)),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "in-process cache read failed"),
        }

        match self.durable.get(&key).await {
            Ok(Some(entry)) => {
                // Promote into the faster tier, keeping the original
                // timestamp so the TTL is unchanged.
                if let Err(e) = self.memory.set(&key, &entry).await {
                    warn!(key = %key, error = %e, "in-process cache refresh failed");
                }
                return Ok(TransactionCheck::hit(&entry));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "durable cache read failed"),
        }

        let canonical = canonical_transaction_id(id);
        match self.store.find(&canonical).await {
            Ok(Some(record)) => {
                let entry = CachedTransaction::new(
                    record.status_flag(),
                    record.order_id,
                    record.invoice_id,
                );
                if let Err(e) = self.durable.set(&key, &entry).await {
                    warn!(key = %key, error = %e, "durable cache refresh failed");
                }
                if let Err(e) = self.memory.set(&key, &entry).await {
                    warn!(key = %key, error = %e, "in-process cache refresh failed");
                }
                Ok(TransactionCheck::hit(&entry))
            }
            Ok(None) => Ok(TransactionCheck::miss(None)),
            Err(e) => match self.lookup_failure_policy {
                LookupFailurePolicy::FailOpen => {
                    warn!(
                        transaction_id = %canonical,
                        error = %e,
                        "authoritative idempotency lookup failed, proceeding per fail-open policy"
                    );
                    Ok(TransactionCheck::miss(Some(
                        "transaction lookup unavailable, treated as new".to_string(),
                    )))
                }
                LookupFailurePolicy::FailClosed => Err(PaymentError::Database(e)),
            },
        }
    }

    /// Register a transaction as `pending` across all tiers.
    ///
    /// Local tiers are written before the remote attempt so a same-process
    /// retry is caught even if the remote write is still in flight. A remote
    /// write failure is logged and swallowed; cross-device detection then
    /// depends on the caller retrying the whole operation.
    pub async fn register_transaction(
        &self,
        id: &str,
        input: RegisterTransaction,
    ) -> PaymentResult<()> {
        if !is_valid_transaction_id(id) {
            return Err(PaymentError::Format {
                transaction_id: id.to_string(),
            });
        }

        let check = self.check_transaction_exists(id).await?;
        if check.exists {
            return Err(PaymentError::Conflict {
                transaction_id: canonical_transaction_id(id),
                status: check.status.unwrap_or(TransactionStatus::Pending),
            });
        }

        let key = RecordKey::new(id).to_string();
        let entry =
            CachedTransaction::new(TransactionStatus::Pending, input.order_id, input.invoice_id);

        if let Err(e) = self.memory.set(&key, &entry).await {
            warn!(key = %key, error = %e, "in-process cache write failed during registration");
        }
        if let Err(e) = self.durable.set(&key, &entry).await {
            warn!(key = %key, error = %e, "durable cache write failed during registration");
        }

        let canonical = canonical_transaction_id(id);
        let record = NewTransaction {
            transaction_id: canonical.clone(),
            order_id: input.order_id,
            invoice_id: input.invoice_id,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| "USD".to_string()),
            user_id: input.user_id,
            metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
        };

        match self.store.insert_pending(&record).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                // Lost a cross-session race; the datastore is the arbiter.
                // The pending entry written above describes the loser, so
                // replace it with the winner's record before reporting the
                // conflict. If the winner cannot be re-read, drop the entry
                // rather than serve the loser's links for the TTL window.
                let status = match self.store.find(&canonical).await {
                    Ok(Some(existing)) => {
                        let winner = CachedTransaction::new(
                            existing.status_flag(),
                            existing.order_id,
                            existing.invoice_id,
                        );
                        if let Err(e) = self.memory.set(&key, &winner).await {
                            warn!(key = %key, error = %e, "in-process cache refresh failed");
                        }
                        if let Err(e) = self.durable.set(&key, &winner).await {
                            warn!(key = %key, error = %e, "durable cache refresh failed");
                        }
                        existing.status_flag()
                    }
                    _ => {
                        if let Err(e) = self.memory.evict(&key).await {
                            warn!(key = %key, error = %e, "in-process cache evict failed");
                        }
                        if let Err(e) = self.durable.evict(&key).await {
                            warn!(key = %key, error = %e, "durable cache evict failed");
                        }
                        TransactionStatus::Pending
                    }
                };
                Err(PaymentError::Conflict {
                    transaction_id: canonical,
                    status,
                })
            }
            Err(e) => {
                warn!(
                    transaction_id = %canonical,
                    error = %e,
                    "remote transaction registration failed, local tiers retain the record"
                );
                Ok(())
            }
        }
    }

    /// Move a registered transaction to its terminal outcome. `pending` is
    /// not re-enterable, which the [`TransactionOutcome`] type enforces.
    ///
    /// All three tiers are written independently; a remote failure does not
    /// fail the call since the caches already reflect the new state. The
    /// richer order/invoice state machine does not apply here.
    pub async fn update_transaction_status(
        &self,
        id: &str,
        outcome: TransactionOutcome,
        metadata: Option<serde_json::Value>,
    ) -> PaymentResult<()> {
        if !is_valid_transaction_id(id) {
            return Err(PaymentError::Format {
                transaction_id: id.to_string(),
            });
        }
        let status = TransactionStatus::from(outcome);

        let key = RecordKey::new(id).to_string();

        // Carry forward known order/invoice links if any tier has them.
        let prior = match self.memory.get(&key).await {
            Ok(Some(entry)) => Some(entry),
            _ => self.durable.get(&key).await.ok().flatten(),
        };
        let entry = CachedTransaction::new(
            status,
            prior.as_ref().and_then(|p| p.order_id),
            prior.as_ref().and_then(|p| p.invoice_id),
        );

        if let Err(e) = self.memory.set(&key, &entry).await {
            warn!(key = %key, error = %e, "in-process cache status write failed");
        }
        if let Err(e) = self.durable.set(&key, &entry).await {
            warn!(key = %key, error = %e, "durable cache status write failed");
        }

        let canonical = canonical_transaction_id(id);
        match self.store.mark_status(&canonical, status, metadata).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(
                    transaction_id = %canonical,
                    "status update hit no remote record, caches updated only"
                );
            }
            Err(e) => {
                warn!(
                    transaction_id = %canonical,
                    error = %e,
                    "remote status update failed, caches updated only"
                );
            }
        }

        Ok(())
    }

    /// Evict cache entries older than the TTL. Never touches the
    /// authoritative store.
    pub async fn cleanup_old_transactions(&self) {
        let from_memory = match self.memory.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "in-process cache purge failed");
                0
            }
        };
        let from_durable = match self.durable.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "durable cache purge failed");
                0
            }
        };

        if from_memory + from_durable > 0 {
            info!(
                from_memory,
                from_durable, "evicted stale transaction cache entries"
            );
        }
    }
}
