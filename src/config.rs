//! Application configuration module
//! Handles environment variable loading, configuration validation, and
//! payment-engine settings.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub payments: PaymentConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Redis cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub max_connections: u32,
}

/// Payment idempotency and reaper settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// TTL for tiered transaction-cache entries.
    pub transaction_ttl: Duration,
    /// Period of the stale-transaction reaper.
    pub cleanup_interval: Duration,
    /// Behavior of the existence check when the authoritative lookup fails.
    pub lookup_failure_policy: LookupFailurePolicy,
}

/// Policy applied when the remote idempotency lookup is unavailable.
///
/// Fail-open risks double processing during a datastore outage; fail-closed
/// blocks legitimate payments instead. This is a product-level decision, so
/// it is configurable at the boundary rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    FailOpen,
    FailClosed,
}

impl FromStr for LookupFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "open" => Ok(LookupFailurePolicy::FailOpen),
            "fail_closed" | "closed" => Ok(LookupFailurePolicy::FailClosed),
            _ => Err(ConfigError::InvalidValue(
                "IDEMPOTENCY_LOOKUP_POLICY must be fail_open or fail_closed".to_string(),
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            database: DatabaseConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            payments: PaymentConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.cache.validate()?;
        self.payments.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CacheConfig {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            max_connections: env::var("CACHE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_MAX_CONNECTIONS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::InvalidValue("REDIS_URL".to_string()));
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(ConfigError::InvalidValue(
                "REDIS_URL must start with redis:// or rediss://".to_string(),
            ));
        }

        Ok(())
    }
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ttl_hours: u64 = env::var("TRANSACTION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("TRANSACTION_TTL_HOURS".to_string()))?;
        let cleanup_secs: u64 = env::var("TRANSACTION_CLEANUP_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue("TRANSACTION_CLEANUP_INTERVAL_SECONDS".to_string())
            })?;
        let policy = env::var("IDEMPOTENCY_LOOKUP_POLICY")
            .unwrap_or_else(|_| "fail_open".to_string())
            .parse::<LookupFailurePolicy>()?;

        Ok(PaymentConfig {
            transaction_ttl: Duration::from_secs(ttl_hours * 3600),
            cleanup_interval: Duration::from_secs(cleanup_secs),
            lookup_failure_policy: policy,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "TRANSACTION_TTL_HOURS cannot be 0".to_string(),
            ));
        }

        if self.cleanup_interval.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "TRANSACTION_CLEANUP_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            transaction_ttl: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(3600),
            lookup_failure_policy: LookupFailurePolicy::FailOpen,
        }
    }
}

/// Install the global tracing subscriber described by the config.
///
/// `RUST_LOG` takes precedence over the configured level when set. A second
/// call is a no-op, so embedding binaries and tests can both call this.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
