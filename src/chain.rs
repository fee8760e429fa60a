//! Chain cache - unified cache facade over an ordered list of backends.

use crate::backend::{shared, CacheEntry, InMemoryBackend, SharedBackend};
use crate::config::{ChainConfig, PromotionMode};
use crate::error::{BackendOp, Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{ChainMetrics, NoOpMetrics};
use crate::serialization;
use futures::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run one backend call under the optional timeout, reporting failures.
///
/// A timeout is converted into `Error::Timeout` and handled like any other
/// fault of that tier.
async fn guarded<T>(
    tier: usize,
    backend: &SharedBackend,
    op: BackendOp,
    timeout: Option<Duration>,
    metrics: &dyn ChainMetrics,
    call: BoxFuture<'_, Result<T>>,
) -> Result<T> {
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} on tier {} ({}) exceeded {:?}",
                op,
                tier,
                backend.backend_name(),
                limit
            ))),
        },
        None => call.await,
    };

    if let Err(e) = &result {
        warn!(
            "⚠ Tier {} ({}) {} failed: {}",
            tier,
            backend.backend_name(),
            op,
            e
        );
        metrics.record_backend_error(tier, op, e);
    }

    result
}

/// Write a hit back into the tiers that missed it.
async fn backfill(
    targets: Vec<(usize, SharedBackend)>,
    key: String,
    entry: CacheEntry,
    timeout: Option<Duration>,
    metrics: Arc<dyn ChainMetrics>,
) {
    let sink = metrics.as_ref();
    let writes = targets.iter().map(|(tier, backend)| {
        let call = backend.boxed_set(&key, entry.value.clone(), entry.ttl);
        async move {
            let result = guarded(*tier, backend, BackendOp::Set, timeout, sink, call).await;
            (*tier, result)
        }
    });

    for (tier, result) in join_all(writes).await {
        if result.is_ok() {
            debug!("✓ Promoted {} into tier {} (TTL: {:?})", key, tier, entry.ttl);
            metrics.record_promotion(&key, tier);
        }
    }
}

/// Result of looking one key up across the chain.
struct Hit {
    tier: usize,
    entry: CacheEntry,
    /// Tiers above `tier` that answered with a clean miss.
    missed: Vec<usize>,
}

/// Unified cache over an ordered chain of backends.
///
/// Index 0 is the highest priority tier and is consulted first. Reads stop
/// at the first hit and back-fill every higher tier that missed; writes,
/// deletes and clears fan out to every tier and report `true` only when all
/// tiers succeeded. Partial writes are not rolled back.
///
/// Backend faults never surface from reads: a failing tier is treated as a
/// miss. Errors are returned only for invalid keys, values that cannot be
/// encoded or decoded, and failing `remember` producers.
///
/// Cloning is cheap; clones share the same backends.
///
/// # Example
///
/// ```no_run
/// # use cache_chain::{ChainCache, backend::{shared, InMemoryBackend, FileBackend}};
/// # use std::time::Duration;
/// # async fn example() -> cache_chain::Result<()> {
/// let cache = ChainCache::new(vec![
///     shared(InMemoryBackend::new()),
///     shared(FileBackend::new("/tmp/app-cache").await?),
/// ]);
///
/// cache.put("u1", &"Alice".to_string(), Duration::from_secs(60)).await?;
/// let name: Option<String> = cache.get("u1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChainCache {
    backends: Arc<[SharedBackend]>,
    metrics: Arc<dyn ChainMetrics>,
    config: Arc<ChainConfig>,
}

impl ChainCache {
    /// Create a chain with the default configuration.
    ///
    /// An empty list is replaced by a single [`InMemoryBackend`].
    pub fn new(backends: Vec<SharedBackend>) -> Self {
        ChainCache::with_config(backends, ChainConfig::default())
    }

    /// Create a chain with an explicit configuration.
    pub fn with_config(mut backends: Vec<SharedBackend>, config: ChainConfig) -> Self {
        if backends.is_empty() {
            debug!("No cache backends configured, falling back to in-memory backend");
            backends.push(shared(InMemoryBackend::new()));
        }

        info!(
            "✓ Cache chain initialized: [{}]",
            backends
                .iter()
                .map(|b| b.backend_name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        ChainCache {
            backends: backends.into(),
            metrics: Arc::new(NoOpMetrics),
            config: Arc::new(config),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn ChainMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Backends in priority order.
    pub fn backends(&self) -> &[SharedBackend] {
        &self.backends
    }

    /// Number of tiers; never zero.
    pub fn tier_count(&self) -> usize {
        self.backends.len()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn full_key(&self, key: &str) -> Result<String> {
        CacheKeyBuilder::build(self.config.prefix.as_deref(), key)
    }

    async fn call<T>(
        &self,
        tier: usize,
        op: BackendOp,
        call: BoxFuture<'_, Result<T>>,
    ) -> Result<T> {
        guarded(
            tier,
            &self.backends[tier],
            op,
            self.config.backend_timeout,
            self.metrics.as_ref(),
            call,
        )
        .await
    }

    /// Consult tiers in priority order until one holds `key`.
    async fn lookup(&self, key: &str) -> Option<Hit> {
        let mut missed = Vec::new();

        for (tier, backend) in self.backends.iter().enumerate() {
            match self.call(tier, BackendOp::Get, backend.boxed_get(key)).await {
                Ok(Some(entry)) => {
                    return Some(Hit {
                        tier,
                        entry,
                        missed,
                    })
                }
                Ok(None) => missed.push(tier),
                // Already reported; a failing tier reads as a miss.
                Err(_) => {}
            }
        }

        None
    }

    async fn promote(&self, key: &str, hit: Hit) {
        if hit.missed.is_empty() {
            return;
        }

        let targets: Vec<(usize, SharedBackend)> = hit
            .missed
            .iter()
            .map(|&tier| (tier, Arc::clone(&self.backends[tier])))
            .collect();
        let timeout = self.config.backend_timeout;
        let metrics = Arc::clone(&self.metrics);

        match self.config.promotion {
            PromotionMode::Detached => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(backfill(
                        targets,
                        key.to_string(),
                        hit.entry,
                        timeout,
                        metrics,
                    ));
                }
                Err(_) => backfill(targets, key.to_string(), hit.entry, timeout, metrics).await,
            },
            PromotionMode::Inline => {
                backfill(targets, key.to_string(), hit.entry, timeout, metrics).await
            }
        }
    }

    /// Issue the same operation to every tier concurrently.
    ///
    /// Returns `true` only if every tier succeeded.
    async fn fan_out<'a, F>(&'a self, op: BackendOp, key: &str, f: F) -> bool
    where
        F: Fn(&'a SharedBackend) -> BoxFuture<'a, Result<()>>,
    {
        let calls = self
            .backends
            .iter()
            .enumerate()
            .map(|(tier, backend)| self.call(tier, op, f(backend)));
        let outcomes = join_all(calls).await;

        let failed = outcomes.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(
                "⚠ {} {} failed on {}/{} tiers",
                op,
                key,
                failed,
                outcomes.len()
            );
        }
        failed == 0
    }

    /// Determine if any tier holds `key`.
    ///
    /// Tiers are consulted in priority order, stopping at the first
    /// tier reporting the key.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` for illegal keys.
    pub async fn has(&self, key: &str) -> Result<bool> {
        let key = self.full_key(key)?;

        for (tier, backend) in self.backends.iter().enumerate() {
            if let Ok(true) = self
                .call(tier, BackendOp::Exists, backend.boxed_exists(&key))
                .await
            {
                debug!("✓ Chain HAS {} -> tier {}", key, tier);
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str, promote: bool) -> Result<Option<T>> {
        let key = self.full_key(key)?;
        let timer = Instant::now();

        let Some(hit) = self.lookup(&key).await else {
            debug!("✗ Chain GET {} -> MISS", key);
            self.metrics.record_miss(&key, timer.elapsed());
            return Ok(None);
        };

        let value = serialization::decode(&hit.entry.value)?;
        debug!(
            "✓ Chain GET {} -> HIT at tier {} ({})",
            key,
            hit.tier,
            self.backends[hit.tier].backend_name()
        );
        self.metrics.record_hit(&key, hit.tier, timer.elapsed());

        if promote {
            self.promote(&key, hit).await;
        }
        Ok(Some(value))
    }

    /// Retrieve a value, promoting it into higher tiers that missed.
    ///
    /// Promoted copies keep the remaining TTL reported by the tier that
    /// held the value, or never expire when it reported none. A total miss
    /// touches no tier. With the default [`PromotionMode::Detached`] the
    /// value is returned before the promotion writes finish.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKey`: illegal key
    /// - `Error::InvalidCacheEntry`, `Error::VersionMismatch`,
    ///   `Error::DeserializationError`: the stored bytes do not decode as `T`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.read(key, true).await
    }

    /// Retrieve a value or `default` when no tier holds it.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Retrieve several values; each key is looked up (and promoted) on its own.
    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[&str]) -> Result<Vec<Option<T>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Retrieve a value and delete it from every tier.
    ///
    /// The value is returned whatever the outcome of the deletes. Nothing is
    /// promoted, so a detached back-fill cannot restore the key afterwards.
    pub async fn pull<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = self.read(key, false).await?;
        self.forget(key).await?;
        Ok(value)
    }

    /// [`pull`](Self::pull) with a fallback value.
    pub async fn pull_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.pull(key).await?.unwrap_or(default))
    }

    async fn store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let key = self.full_key(key)?;
        let bytes = serialization::encode(value)?;

        let stored = self
            .fan_out(BackendOp::Set, &key, |backend| {
                backend.boxed_set(&key, bytes.clone(), ttl)
            })
            .await;

        debug!(
            "{} Chain PUT {} (TTL: {:?})",
            if stored { "✓" } else { "✗" },
            key,
            ttl
        );
        Ok(stored)
    }

    /// Store a value in every tier for `ttl`.
    ///
    /// Returns `Ok(false)` when at least one tier failed; tiers that
    /// succeeded keep the value.
    ///
    /// # Errors
    /// Returns `Err` for illegal keys or values that cannot be serialized.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool> {
        self.store(key, value, Some(ttl)).await
    }

    /// Store a value only if no tier holds `key` yet.
    ///
    /// Returns `Ok(false)` without writing anything when the key exists.
    pub async fn add<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool> {
        if self.has(key).await? {
            debug!("Chain ADD {} skipped, key exists", key);
            return Ok(false);
        }
        self.put(key, value, ttl).await
    }

    /// Store a value in every tier without expiry.
    pub async fn forever<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.store(key, value, None).await
    }

    async fn remember_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = producer().await?;
        self.store(key, &value, ttl).await?;
        Ok(value)
    }

    /// Get a value, or produce and store it for `ttl` on a miss.
    ///
    /// The producer runs at most once per call and never when a tier holds
    /// the key. There is no coordination between concurrent callers: two
    /// callers missing at the same time may both run the producer.
    ///
    /// # Errors
    /// A producer error is returned as-is and nothing is cached. Chain
    /// errors are converted through `E: From<Error>`.
    pub async fn remember<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.remember_with(key, Some(ttl), producer).await
    }

    /// [`remember`](Self::remember) without expiry.
    pub async fn remember_forever<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.remember_with(key, None, producer).await
    }

    /// Delete `key` from every tier.
    ///
    /// Absent keys count as deleted; returns `Ok(false)` only when a tier
    /// failed.
    pub async fn forget(&self, key: &str) -> Result<bool> {
        let key = self.full_key(key)?;
        let removed = self
            .fan_out(BackendOp::Delete, &key, |backend| backend.boxed_delete(&key))
            .await;
        debug!("Chain FORGET {} -> {}", key, removed);
        Ok(removed)
    }

    /// Delete several keys from every tier.
    ///
    /// All keys are validated before any tier is touched.
    pub async fn forget_many(&self, keys: &[&str]) -> Result<bool> {
        let full_keys = keys
            .iter()
            .map(|key| self.full_key(key))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&str> = full_keys.iter().map(String::as_str).collect();

        let removed = self
            .fan_out(BackendOp::Delete, "<many>", |backend| {
                backend.boxed_mdelete(&refs)
            })
            .await;
        debug!("Chain FORGET {} keys -> {}", refs.len(), removed);
        Ok(removed)
    }

    /// Remove every entry from every tier.
    pub async fn clear(&self) -> Result<bool> {
        let cleared = self
            .fan_out(BackendOp::Clear, "*", |backend| backend.boxed_clear_all())
            .await;
        warn!("⚠ Chain CLEAR executed on {} tiers -> {}", self.tier_count(), cleared);
        Ok(cleared)
    }

    /// Health of each tier, in priority order.
    pub async fn health_check(&self) -> Vec<bool> {
        let timeout = self.config.backend_timeout;
        let checks = self.backends.iter().map(|backend| async move {
            let check = backend.boxed_health_check();
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, check)
                    .await
                    .unwrap_or(Ok(false)),
                None => check.await,
            };
            result.unwrap_or(false)
        });
        join_all(checks).await
    }
}
