//! Builder pattern for assembling a backend chain.

use crate::backend::{
    shared, CacheBackend, FileBackend, InMemoryBackend, SharedBackend, VoidBackend,
};
use crate::chain::ChainCache;
use crate::config::{ChainConfig, PromotionMode};
use crate::error::Result;
use crate::observability::ChainMetrics;
use crate::registry::BackendRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A backend selected on the builder, constructed in `build`.
enum PendingBackend {
    Ready(SharedBackend),
    Memory { limit: Option<usize> },
    Void,
    File(PathBuf),
    #[cfg(feature = "memcached")]
    Memcached(String),
    #[cfg(feature = "redis")]
    Redis(String),
    Named(String),
}

impl PendingBackend {
    async fn construct(self, registry: &BackendRegistry) -> Result<SharedBackend> {
        match self {
            PendingBackend::Ready(backend) => Ok(backend),
            PendingBackend::Memory { limit: None } => Ok(shared(InMemoryBackend::new())),
            PendingBackend::Memory { limit: Some(n) } => Ok(shared(InMemoryBackend::with_limit(n))),
            PendingBackend::Void => Ok(shared(VoidBackend::new())),
            PendingBackend::File(root) => Ok(shared(FileBackend::new(root).await?)),
            #[cfg(feature = "memcached")]
            PendingBackend::Memcached(addr) => Ok(shared(
                crate::backend::MemcachedBackend::from_server(addr).await?,
            )),
            #[cfg(feature = "redis")]
            PendingBackend::Redis(url) => {
                Ok(shared(crate::backend::RedisBackend::from_url(url).await?))
            }
            PendingBackend::Named(name) => registry.resolve(&name).await,
        }
    }
}

/// Fluent builder selecting cache tiers in priority order.
///
/// Each call appends one tier; the first call becomes the tier consulted
/// first. Nothing is constructed until [`build`](Self::build).
///
/// # Example
///
/// ```no_run
/// use cache_chain::ChainBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> cache_chain::Result<()> {
/// let cache = ChainBuilder::new()
///     .memory_with_limit(10_000)
///     .file("/var/cache/app")
///     .backend_timeout(Duration::from_millis(200))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ChainBuilder {
    pending: Vec<PendingBackend>,
    registry: BackendRegistry,
    config: ChainConfig,
    metrics: Option<Arc<dyn ChainMetrics>>,
}

impl Default for ChainBuilder {
    fn default() -> Self {
        ChainBuilder::new()
    }
}

impl ChainBuilder {
    /// Create a builder with no tiers and the default registry.
    pub fn new() -> Self {
        ChainBuilder {
            pending: Vec::new(),
            registry: BackendRegistry::with_defaults(),
            config: ChainConfig::default(),
            metrics: None,
        }
    }

    fn push(mut self, backend: PendingBackend) -> Self {
        self.pending.push(backend);
        self
    }

    /// Append an unbounded in-memory tier.
    pub fn memory(self) -> Self {
        self.push(PendingBackend::Memory { limit: None })
    }

    /// Append an in-memory tier holding at most `limit` keys.
    pub fn memory_with_limit(self, limit: usize) -> Self {
        self.push(PendingBackend::Memory { limit: Some(limit) })
    }

    /// Append a tier that stores nothing.
    pub fn void(self) -> Self {
        self.push(PendingBackend::Void)
    }

    /// Append a filesystem tier rooted at `root`.
    pub fn file(self, root: impl Into<PathBuf>) -> Self {
        self.push(PendingBackend::File(root.into()))
    }

    /// Append a Memcached tier, e.g. `"127.0.0.1:11211"`.
    #[cfg(feature = "memcached")]
    pub fn memcached(self, addr: impl Into<String>) -> Self {
        self.push(PendingBackend::Memcached(addr.into()))
    }

    /// Append a Redis tier, e.g. `"redis://127.0.0.1:6379"`.
    #[cfg(feature = "redis")]
    pub fn redis(self, url: impl Into<String>) -> Self {
        self.push(PendingBackend::Redis(url.into()))
    }

    /// Append an already-constructed backend.
    pub fn backend<B: CacheBackend + 'static>(self, backend: B) -> Self {
        self.push(PendingBackend::Ready(shared(backend)))
    }

    /// Append an already-shared backend.
    pub fn shared_backend(self, backend: SharedBackend) -> Self {
        self.push(PendingBackend::Ready(backend))
    }

    /// Append a tier constructed from the registry entry `name`.
    ///
    /// Unknown names fail [`build`](Self::build) with `Error::UnknownBackend`.
    pub fn named(self, name: impl Into<String>) -> Self {
        self.push(PendingBackend::Named(name.into()))
    }

    /// Replace the registry used to resolve [`named`](Self::named) tiers.
    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Namespace every key as `"{prefix}:{key}"`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Bound every backend call by `timeout`.
    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend_timeout = Some(timeout);
        self
    }

    /// Choose whether `get` waits for promotion writes.
    pub fn promotion(mut self, mode: PromotionMode) -> Self {
        self.config.promotion = mode;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ChainMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Construct every selected tier, in order, and assemble the chain.
    ///
    /// With no tiers selected the chain falls back to one in-memory tier.
    ///
    /// # Errors
    ///
    /// Returns the first construction failure:
    /// - `Error::UnknownBackend`: a `named` tier is not in the registry
    /// - `Error::ConfigError`: a backend rejected its configuration
    pub async fn build(self) -> Result<ChainCache> {
        let ChainBuilder {
            pending,
            registry,
            config,
            metrics,
        } = self;

        let mut backends = Vec::with_capacity(pending.len());
        for backend in pending {
            backends.push(backend.construct(&registry).await?);
        }

        let cache = ChainCache::with_config(backends, config);
        Ok(match metrics {
            Some(metrics) => cache.with_metrics(metrics),
            None => cache,
        })
    }
}

impl ChainCache {
    /// Start a [`ChainBuilder`].
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn tier_names(cache: &ChainCache) -> Vec<&'static str> {
        cache
            .backends()
            .iter()
            .map(|backend| backend.backend_name())
            .collect()
    }

    #[tokio::test]
    async fn test_builder_preserves_call_order() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let cache = ChainBuilder::new()
            .memory()
            .file(dir.path())
            .void()
            .build()
            .await
            .expect("Failed to build");

        assert_eq!(tier_names(&cache), vec!["memory", "file", "void"]);
    }

    #[tokio::test]
    async fn test_builder_without_tiers_falls_back_to_memory() {
        let cache = ChainCache::builder().build().await.expect("Failed to build");
        assert_eq!(tier_names(&cache), vec!["memory"]);
    }

    #[tokio::test]
    async fn test_named_tier_resolves_through_registry() {
        let mut registry = BackendRegistry::new();
        registry.register("sessions", || async { Ok(InMemoryBackend::with_limit(8)) });

        let cache = ChainBuilder::new()
            .with_registry(registry)
            .named("sessions")
            .void()
            .build()
            .await
            .expect("Failed to build");

        assert_eq!(tier_names(&cache), vec!["memory", "void"]);
    }

    #[tokio::test]
    async fn test_default_registry_names() {
        let cache = ChainBuilder::new()
            .named("array")
            .named("void")
            .build()
            .await
            .expect("Failed to build");

        assert_eq!(tier_names(&cache), vec!["memory", "void"]);
    }

    #[tokio::test]
    async fn test_unknown_named_tier_fails_build() {
        let result = ChainBuilder::new().memory().named("apcu").build().await;

        match result {
            Err(Error::UnknownBackend(name)) => assert_eq!(name, "apcu"),
            Err(other) => panic!("Expected UnknownBackend, got {:?}", other),
            Ok(_) => panic!("Expected UnknownBackend, got a chain"),
        }
    }

    #[tokio::test]
    async fn test_builder_applies_config() {
        let backend = InMemoryBackend::new();

        let cache = ChainBuilder::new()
            .backend(backend.clone())
            .prefix("app")
            .backend_timeout(Duration::from_millis(250))
            .promotion(PromotionMode::Inline)
            .build()
            .await
            .expect("Failed to build");

        assert_eq!(cache.config().prefix.as_deref(), Some("app"));
        assert_eq!(
            cache.config().backend_timeout,
            Some(Duration::from_millis(250))
        );
        assert_eq!(cache.config().promotion, PromotionMode::Inline);

        cache.forever("k", &1u8).await.expect("Failed to store");
        assert!(backend.exists("app:k").await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_memory_limit_is_applied() {
        let backend = InMemoryBackend::with_limit(1);
        let cache = ChainBuilder::new()
            .backend(backend.clone())
            .build()
            .await
            .expect("Failed to build");

        cache.forever("a", &1u8).await.expect("Failed to store");
        cache.forever("b", &2u8).await.expect("Failed to store");
        assert_eq!(backend.len(), 1);
        assert!(!cache.has("a").await.expect("Failed to check"));
    }
}
