//! Stale-transaction reaper.
//!
//! Periodically evicts tiered cache entries older than the TTL. Runs
//! independently of in-flight operations; eviction is delete-if-expired, so
//! it is safe to run concurrently with reads and writes on the same keys.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::services::idempotency::IdempotencyService;

#[derive(Debug, Clone)]
pub struct TransactionReaperConfig {
    /// How often the worker wakes up to sweep the cache tiers.
    pub cleanup_interval: Duration,
}

impl Default for TransactionReaperConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl TransactionReaperConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.cleanup_interval = Duration::from_secs(
            std::env::var("TRANSACTION_CLEANUP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.cleanup_interval.as_secs()),
        );
        cfg
    }
}

pub struct TransactionReaperWorker {
    idempotency: Arc<IdempotencyService>,
    config: TransactionReaperConfig,
}

impl TransactionReaperWorker {
    pub fn new(idempotency: Arc<IdempotencyService>, config: TransactionReaperConfig) -> Self {
        Self {
            idempotency,
            config,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            "transaction reaper worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("transaction reaper worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.cleanup_interval) => {
                    self.idempotency.cleanup_old_transactions().await;
                }
            }
        }

        info!("transaction reaper worker stopped");
    }
}

/// Spawn the reaper on the current runtime; returns its join handle.
pub fn spawn(
    idempotency: Arc<IdempotencyService>,
    config: TransactionReaperConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(TransactionReaperWorker::new(idempotency, config).run(shutdown_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_hourly() {
        let config = TransactionReaperConfig::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
    }
}
