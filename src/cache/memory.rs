//! In-process tier of the transaction cache.
//!
//! Process-wide mutable state with no lifecycle beyond the process; any
//! component may read or write it and none may assume exclusive ownership.
//! Entries expire after the configured TTL measured from their own
//! timestamp, so a same-process retry is caught even before the durable
//! tiers are written.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::error::CacheResult;
use super::{CachedTransaction, TransactionCache};

pub struct InMemoryTransactionCache {
    entries: RwLock<HashMap<String, CachedTransaction>>,
    ttl: Duration,
}

impl InMemoryTransactionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired_at(now, self.ttl))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TransactionCache for InMemoryTransactionCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedTransaction>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired_at(now, self.ttl) => {
                    return Ok(Some(entry.clone()))
                }
                Some(_) => {} // expired, fall through to remove
                None => return Ok(None),
            }
        }

        // Lazily drop the expired entry; the reaper would get it eventually.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, entry: &CachedTransaction) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn evict(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now, self.ttl));
        Ok(before - entries.len())
    }
}
