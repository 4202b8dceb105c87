//! Redis tier of the transaction cache.
//!
//! Shared by every worker of a deployment, eventually consistent with the
//! authoritative datastore. Corruption contract: an entry that fails to
//! parse is treated as absent and evicted, never as a fatal error.

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{CacheError, CacheResult};
use super::{keys, CachedTransaction, RedisPool, TransactionCache};

pub struct RedisTransactionCache {
    pool: RedisPool,
    ttl: Duration,
}

impl RedisTransactionCache {
    pub fn new(pool: RedisPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    fn parse_entry(&self, key: &str, raw: &str) -> Option<CachedTransaction> {
        match serde_json::from_str::<CachedTransaction>(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "corrupt transaction cache entry, treating as absent");
                None
            }
        }
    }
}

#[async_trait]
impl TransactionCache for RedisTransactionCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedTransaction>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(key).await?;

        let Some(raw) = raw else { return Ok(None) };

        match self.parse_entry(key, &raw) {
            Some(entry) if !entry.is_expired_at(Utc::now(), self.ttl) => Ok(Some(entry)),
            Some(_) | None => {
                // Expired (Redis TTL missing or drifted) or corrupt: drop it.
                let _: () = conn.del(key).await.unwrap_or(());
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, entry: &CachedTransaction) -> CacheResult<()> {
        let payload = serde_json::to_string(entry)?;

        // Remaining lifetime is measured from the entry's own timestamp so a
        // promoted entry does not get a fresh 24 hours.
        let age_secs = Utc::now()
            .signed_duration_since(entry.timestamp)
            .num_seconds()
            .max(0) as u64;
        let remaining = self.ttl.as_secs().saturating_sub(age_secs);
        if remaining == 0 {
            return Ok(());
        }

        let mut conn = self.pool.get().await?;
        let _: () = conn.set_ex(key, payload, remaining).await?;
        Ok(())
    }

    async fn evict(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let mut conn = self.pool.get().await?;
        let mut cursor: u64 = 0;
        let mut evicted = 0usize;

        // Redis expires entries on its own; this sweep catches entries
        // written by older clients without a TTL, plus corrupt payloads.
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(keys::transaction::SCAN_PATTERN)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await
                .map_err(CacheError::from)?;

            for key in batch {
                let raw: Option<String> = conn.get(&key).await?;
                let stale = match raw {
                    Some(raw) => match self.parse_entry(&key, &raw) {
                        Some(entry) => entry.is_expired_at(Utc::now(), self.ttl),
                        None => true,
                    },
                    None => false,
                };

                if stale {
                    let _: () = conn.del(&key).await?;
                    evicted += 1;
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(evicted, "redis transaction cache sweep finished");
        Ok(evicted)
    }
}
