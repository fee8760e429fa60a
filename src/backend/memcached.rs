//! Memcached cache backend implementation.

use super::{CacheBackend, CacheEntry};
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Object, Pool};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default Memcached connection pool size.
/// Override with MEMCACHED_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Expirations above 30 days are read by Memcached as a unix timestamp.
const MAX_RELATIVE_EXPIRY_SECS: u64 = 60 * 60 * 24 * 30;

/// Configuration for Memcached backend.
#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    pub server: String, // e.g., "127.0.0.1:11211"
    pub pool_size: usize,
    /// How long to wait for a pooled connection before the call counts as
    /// a backend failure.
    pub checkout_timeout: Duration,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        MemcachedConfig {
            server: "127.0.0.1:11211".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            checkout_timeout: Duration::from_secs(5),
        }
    }
}

impl MemcachedConfig {
    /// Config for `server` with the pool size taken from `MEMCACHED_POOL_SIZE`.
    pub fn from_server(server: impl Into<String>) -> Self {
        let pool_size = std::env::var("MEMCACHED_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        MemcachedConfig {
            server: server.into(),
            pool_size,
            ..Default::default()
        }
    }
}

/// Memcached tier with connection pooling.
///
/// Memcached cannot report a key's remaining TTL, so entries read from it
/// carry `ttl: None` and are promoted without expiry.
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
    checkout_timeout: Duration,
}

impl MemcachedBackend {
    /// Create new Memcached backend from configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for an empty server address or when the
    /// pool cannot be built
    pub async fn new(config: MemcachedConfig) -> Result<Self> {
        if config.server.trim().is_empty() {
            return Err(Error::ConfigError(
                "Memcached server address is empty".to_string(),
            ));
        }

        let pool = Pool::builder(Manager::new(config.server.clone()))
            .max_size(config.pool_size)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create Memcached pool: {}", e)))?;

        info!(
            "✓ Memcached backend initialized with server: {} (pool size: {})",
            config.server, config.pool_size
        );

        Ok(MemcachedBackend {
            pool,
            checkout_timeout: config.checkout_timeout,
        })
    }

    /// Create from a server address directly.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails
    pub async fn from_server(addr: impl Into<String>) -> Result<Self> {
        Self::new(MemcachedConfig::from_server(addr)).await
    }

    async fn connection(&self) -> Result<Object> {
        match tokio::time::timeout(self.checkout_timeout, self.pool.get()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(Error::BackendError(format!(
                "Failed to get Memcached connection: {}",
                e
            ))),
            Err(_) => Err(Error::Timeout(format!(
                "Memcached connection checkout exceeded {:?}",
                self.checkout_timeout
            ))),
        }
    }
}

/// Memcached reports deleting an absent key as an error; the chain treats
/// it as success.
fn is_not_found(err: &impl std::fmt::Display) -> bool {
    err.to_string().to_lowercase().contains("not found")
}

/// Memcached `exptime` for `ttl`: seconds from now up to 30 days, an
/// absolute unix timestamp beyond that. `None` stores without expiry,
/// including deadlines past the `i64` range.
fn expiry_secs(ttl: Option<Duration>, now_unix_secs: u64) -> Option<i64> {
    let secs = ttl?.as_secs().max(1);
    if secs <= MAX_RELATIVE_EXPIRY_SECS {
        return Some(secs as i64);
    }
    now_unix_secs
        .checked_add(secs)
        .and_then(|at| i64::try_from(at).ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn command_error(op: &str, key: &str, err: impl std::fmt::Display) -> Error {
    Error::BackendError(format!("Memcached {} failed for key {}: {}", op, key, err))
}

impl CacheBackend for MemcachedBackend {
    fn name(&self) -> &'static str {
        "memcached"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.connection().await?;
        let value = conn
            .get(key)
            .await
            .map_err(|e| command_error("GET", key, e))?;

        let entry = value.and_then(|v| v.data).map(CacheEntry::persistent);
        debug!(
            "✓ Memcached GET {} -> {}",
            key,
            if entry.is_some() { "HIT" } else { "MISS" }
        );
        Ok(entry)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set(key, value.as_slice(), expiry_secs(ttl, now_unix_secs()), None)
            .await
            .map_err(|e| command_error("SET", key, e))?;

        debug!("✓ Memcached SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        match conn.delete(key).await {
            Err(e) if !is_not_found(&e) => Err(command_error("DELETE", key, e)),
            _ => {
                debug!("✓ Memcached DELETE {}", key);
                Ok(())
            }
        }
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        let mut conn = self.connection().await?;
        for key in keys {
            match conn.delete(key).await {
                Err(e) if !is_not_found(&e) => return Err(command_error("DELETE", key, e)),
                _ => {}
            }
        }

        debug!("✓ Memcached MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };
        Ok(conn.get("__health_check__").await.is_ok())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.flush_all()
            .await
            .map_err(|e| Error::BackendError(format!("Memcached FLUSH_ALL failed: {}", e)))?;

        warn!("⚠ Memcached FLUSH_ALL executed - all cache cleared!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memcached_config_default() {
        let config = MemcachedConfig::default();
        assert_eq!(config.server, "127.0.0.1:11211");
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.checkout_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_server_is_config_error() {
        let config = MemcachedConfig {
            server: "  ".to_string(),
            ..Default::default()
        };

        match MemcachedBackend::new(config).await {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("empty")),
            Err(other) => panic!("Expected ConfigError, got {:?}", other),
            Ok(_) => panic!("Expected ConfigError, got a backend"),
        }
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(&"NOT FOUND"));
        assert!(is_not_found(&"key not found"));
        assert!(!is_not_found(&"connection reset"));
    }

    #[test]
    fn test_expiry_relative_and_absolute() {
        let now = 1_700_000_000;
        assert_eq!(expiry_secs(None, now), None);
        assert_eq!(expiry_secs(Some(Duration::from_millis(200)), now), Some(1));
        assert_eq!(expiry_secs(Some(Duration::from_secs(60)), now), Some(60));
        assert_eq!(
            expiry_secs(Some(Duration::from_secs(MAX_RELATIVE_EXPIRY_SECS)), now),
            Some(MAX_RELATIVE_EXPIRY_SECS as i64)
        );

        let ninety_days = MAX_RELATIVE_EXPIRY_SECS * 3;
        assert_eq!(
            expiry_secs(Some(Duration::from_secs(ninety_days)), now),
            Some((now + ninety_days) as i64)
        );
        assert_eq!(expiry_secs(Some(Duration::MAX), now), None);
    }
}
