//! Cache backend trait and implementations.
//!
//! A backend is a single key-value store with per-key expiration. The chain
//! facade never talks to a concrete type: every backend is erased behind
//! [`DynCacheBackend`] and shared as a [`SharedBackend`].

use crate::error::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub mod file;
pub mod inmemory;
#[cfg(feature = "memcached")]
pub mod memcached;
#[cfg(feature = "redis")]
pub mod redis;
pub mod void;

pub use file::FileBackend;
pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConfig};
pub use void::VoidBackend;

/// A value read from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Stored bytes, exactly as written.
    pub value: Vec<u8>,
    /// Remaining time-to-live at read time. `None` means the entry never
    /// expires or the backend cannot report it.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        CacheEntry { value, ttl }
    }

    /// Entry without expiry.
    pub fn persistent(value: Vec<u8>) -> Self {
        CacheEntry { value, ttl: None }
    }
}

/// Storage contract every cache tier implements.
///
/// Implementations may write the methods as `async fn`. Returned futures
/// must be `Send` so tiers can be driven from any tokio worker.
///
/// A miss is `Ok(None)`; `Err` means the backend itself is unavailable.
/// Deleting an absent key must succeed.
pub trait CacheBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Read an entry together with its remaining TTL.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry>>> + Send;

    /// Store bytes under `key`. `ttl = None` stores without expiry.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. Absent keys are not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check whether `key` holds a live entry.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }

    /// Delete several keys. The default issues one delete per key.
    fn mdelete(&self, keys: &[&str]) -> impl Future<Output = Result<()>> + Send {
        async move {
            for key in keys {
                self.delete(key).await?;
            }
            Ok(())
        }
    }

    /// Report whether the backend is reachable.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }

    /// Remove every entry held by this backend.
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Object-safe view of a [`CacheBackend`].
///
/// Blanket-implemented for every backend; the chain stores
/// `Arc<dyn DynCacheBackend>` so tiers of different types can be mixed.
pub trait DynCacheBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn boxed_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>>;

    fn boxed_set<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<()>>;

    fn boxed_delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

    fn boxed_exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

    fn boxed_mdelete<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<()>>;

    fn boxed_health_check(&self) -> BoxFuture<'_, Result<bool>>;

    fn boxed_clear_all(&self) -> BoxFuture<'_, Result<()>>;
}

impl<B: CacheBackend> DynCacheBackend for B {
    fn backend_name(&self) -> &'static str {
        CacheBackend::name(self)
    }

    fn boxed_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
        Box::pin(CacheBackend::get(self, key))
    }

    fn boxed_set<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(CacheBackend::set(self, key, value, ttl))
    }

    fn boxed_delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(CacheBackend::delete(self, key))
    }

    fn boxed_exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(CacheBackend::exists(self, key))
    }

    fn boxed_mdelete<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<()>> {
        Box::pin(CacheBackend::mdelete(self, keys))
    }

    fn boxed_health_check(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(CacheBackend::health_check(self))
    }

    fn boxed_clear_all(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(CacheBackend::clear_all(self))
    }
}

/// Shared handle to an erased backend.
pub type SharedBackend = Arc<dyn DynCacheBackend>;

/// Erase a concrete backend into a [`SharedBackend`].
pub fn shared<B: CacheBackend + 'static>(backend: B) -> SharedBackend {
    Arc::new(backend)
}
