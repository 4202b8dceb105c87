//! Tiered transaction caching for the payment idempotency layer
//!
//! Two cache tiers sit in front of the authoritative datastore: an
//! in-process map for same-session retries and a Redis tier shared by all
//! workers on the same deployment. Both degrade gracefully when
//! unavailable; they accelerate the idempotency check but never replace the
//! uniqueness constraint of the remote store.

pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_tier;

use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use chrono::{DateTime, Utc};
use redis::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::status_transition::TransactionStatus;
use error::{CacheError, CacheResult};

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

/// Cached view of a payment transaction.
///
/// This is the JSON value stored under `txn_{ID}` keys; field names are the
/// wire format shared with other storefront clients, so they stay camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTransaction {
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<Uuid>,
    /// Insertion/last-refresh time; the TTL is measured from here.
    pub timestamp: DateTime<Utc>,
}

impl CachedTransaction {
    pub fn new(
        status: TransactionStatus,
        order_id: Option<Uuid>,
        invoice_id: Option<Uuid>,
    ) -> Self {
        Self {
            status,
            order_id,
            invoice_id,
            timestamp: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age.num_seconds() >= ttl.as_secs() as i64
    }
}

/// A single tier of the transaction cache.
///
/// Injected into the idempotency service rather than held as module-level
/// state, so tiers can be swapped (or faked in tests) independently.
#[async_trait]
pub trait TransactionCache: Send + Sync {
    /// Look up an entry; expired entries are treated as absent.
    async fn get(&self, key: &str) -> CacheResult<Option<CachedTransaction>>;

    /// Insert or refresh an entry. The entry's own timestamp governs expiry,
    /// so promoting an entry from a slower tier preserves its original age.
    async fn set(&self, key: &str, entry: &CachedTransaction) -> CacheResult<()>;

    /// Remove an entry if present.
    async fn evict(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry older than the TTL; returns how many were evicted.
    async fn purge_expired(&self) -> CacheResult<usize>;
}

/// Redis cache pool configuration
#[derive(Debug, Clone)]
pub struct CachePoolConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub min_idle: u32,
    pub connection_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl Default for CachePoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
            min_idle: 2,
            connection_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Initialize the Redis connection pool with fault tolerance
pub async fn init_cache_pool(config: CachePoolConfig) -> Result<RedisPool, CacheError> {
    info!(
        "Initializing Redis cache pool: max_connections={}, redis_url={}",
        config.max_connections, config.redis_url
    );

    let client = Client::open(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis client: {}", e);
        CacheError::Connection(e.to_string())
    })?;

    let manager = RedisConnectionManager::new(client.get_connection_info().clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::Connection(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(config.min_idle)
        .connection_timeout(config.connection_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::Connection(e.to_string())
        })?;

    // An unreachable Redis at startup degrades the cache, it does not take
    // the service down.
    if let Err(e) = test_connection(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    info!("Redis cache pool initialized successfully");
    Ok(pool)
}

async fn test_connection(pool: &RedisPool) -> Result<(), CacheError> {
    let mut conn = pool.get().await.map_err(|e| {
        error!("Failed to get Redis connection for test: {}", e);
        CacheError::Connection(e.to_string())
    })?;

    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| {
            error!("Redis PING failed: {}", e);
            CacheError::Connection(e.to_string())
        })?;

    Ok(())
}

/// Health check for the Redis connection pool
pub async fn health_check(pool: &RedisPool) -> Result<(), CacheError> {
    test_connection(pool).await
}
