//! Redis cache backend implementation.

use super::{CacheBackend, CacheEntry};
use crate::error::{Error, Result};
use deadpool_redis::redis;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::time::Duration;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String, // e.g., "redis://127.0.0.1:6379/0"
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RedisConfig {
    /// Config for `url` with the pool size taken from `REDIS_POOL_SIZE`.
    pub fn from_url(url: impl Into<String>) -> Self {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        RedisConfig {
            url: url.into(),
            pool_size,
        }
    }
}

/// Redis tier with connection pooling.
///
/// Reads fetch the value and its `PTTL` in one pipeline, so promoted copies
/// keep the remaining lifetime of the Redis entry.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// The pool connects lazily; an unreachable server surfaces on first use.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or pool creation fails
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized with url: {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from a connection URL directly.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig::from_url(url)).await
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

/// Interpret a `PTTL` reply: `-1` means no expiry, `-2` means the key vanished.
fn remaining_ttl(pttl: i64) -> Option<Option<Duration>> {
    match pttl {
        -2 => None,
        ms if ms < 0 => Some(None),
        ms => Some(Some(Duration::from_millis(ms as u64))),
    }
}

/// Longest `PX` Redis accepts without overflowing its absolute deadline.
const MAX_PX_MILLIS: u64 = i64::MAX as u64 / 2;

/// `PX` argument for `ttl`; `None` stores without expiry. TTLs beyond what
/// Redis can represent never expire.
fn px_millis(ttl: Option<Duration>) -> Option<u64> {
    let ms = u64::try_from(ttl?.as_millis()).unwrap_or(u64::MAX);
    // PX 0 is rejected by Redis
    (ms <= MAX_PX_MILLIS).then(|| ms.max(1))
}

impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.connection().await?;

        let (value, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .cmd("GET")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Redis GET failed for key {}: {}", key, e))
            })?;

        match (value, remaining_ttl(pttl)) {
            (Some(bytes), Some(ttl)) => {
                debug!("✓ Redis GET {} -> HIT", key);
                Ok(Some(CacheEntry::new(bytes, ttl)))
            }
            _ => {
                debug!("✓ Redis GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ms) = px_millis(ttl) {
            cmd.arg("PX").arg(ms);
        }

        cmd.query_async::<()>(&mut conn).await.map_err(|e| {
            Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
        })?;

        if let Some(d) = ttl {
            debug!("✓ Redis SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ Redis SET {}", key);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;

        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e))
            })?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;

        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Redis EXISTS failed for key {}: {}", key, e))
            })?;

        Ok(count > 0)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;

        redis::cmd("DEL")
            .arg(keys)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed: {}", e)))?;

        debug!("✓ Redis MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let Ok(mut conn) = self.pool.get().await else {
            return Ok(false);
        };

        Ok(redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.connection().await?;

        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_pttl_interpretation() {
        assert_eq!(remaining_ttl(-2), None);
        assert_eq!(remaining_ttl(-1), Some(None));
        assert_eq!(
            remaining_ttl(1500),
            Some(Some(Duration::from_millis(1500)))
        );
    }

    #[test]
    fn test_px_argument() {
        assert_eq!(px_millis(None), None);
        assert_eq!(px_millis(Some(Duration::ZERO)), Some(1));
        assert_eq!(px_millis(Some(Duration::from_secs(60))), Some(60_000));
        assert_eq!(px_millis(Some(Duration::MAX)), None);
        assert_eq!(
            px_millis(Some(Duration::from_millis(MAX_PX_MILLIS))),
            Some(MAX_PX_MILLIS)
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let result = RedisBackend::new(RedisConfig {
            url: "not a url".to_string(),
            pool_size: 1,
        })
        .await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
