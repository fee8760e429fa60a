//! End-to-end behaviour of a chain assembled from real backends.

use cache_chain::backend::{CacheEntry, FileBackend, InMemoryBackend};
use cache_chain::{
    serialization, BackendRegistry, CacheBackend, ChainBuilder, ChainConfig, Error,
    PromotionMode, Result,
};
use std::time::Duration;

/// Backend that rejects every call.
struct DownBackend;

impl CacheBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn health_check(&self) -> Result<bool> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn clear_all(&self) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }
}

/// Backend that reads like an empty store but rejects writes.
struct ReadOnlyBackend;

impl CacheBackend for ReadOnlyBackend {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(Error::BackendError("read-only replica".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_file_hit_is_promoted_into_memory() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let memory = InMemoryBackend::new();
    let disk = FileBackend::new(dir.path())
        .await
        .expect("Failed to open file backend");

    let bytes = serialization::encode("Alice").expect("Failed to encode");
    disk.set("u1", bytes, Some(Duration::from_secs(60)))
        .await
        .expect("Failed to seed file tier");

    let cache = ChainBuilder::new()
        .backend(memory.clone())
        .backend(disk)
        .promotion(PromotionMode::Inline)
        .build()
        .await
        .expect("Failed to build chain");

    let name: Option<String> = cache.get("u1").await.expect("Failed to get");
    assert_eq!(name.as_deref(), Some("Alice"));

    let promoted = memory
        .get("u1")
        .await
        .expect("Failed to read memory tier")
        .expect("Memory tier was not back-filled");
    let ttl = promoted.ttl.expect("Promoted entry lost its TTL");
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::ZERO);
}

#[tokio::test]
async fn test_down_tier_does_not_abort_lookup() {
    let healthy = InMemoryBackend::new();
    healthy
        .set(
            "x",
            serialization::encode(&42i32).expect("Failed to encode"),
            None,
        )
        .await
        .expect("Failed to seed");

    let cache = ChainBuilder::new()
        .backend(DownBackend)
        .backend(healthy)
        .build()
        .await
        .expect("Failed to build chain");

    let value: Option<i32> = cache.get("x").await.expect("Failed to get");
    assert_eq!(value, Some(42));
    assert!(cache.has("x").await.expect("Failed to check"));
}

#[tokio::test]
async fn test_partial_put_failure_keeps_value_readable() {
    let cache = ChainBuilder::new()
        .memory()
        .backend(ReadOnlyBackend)
        .build()
        .await
        .expect("Failed to build chain");

    let stored = cache
        .put("k", "v", Duration::from_secs(60))
        .await
        .expect("Failed to put");
    assert!(!stored);

    let value: Option<String> = cache.get("k").await.expect("Failed to get");
    assert_eq!(value.as_deref(), Some("v"));
}

#[tokio::test]
async fn test_all_tiers_down_reads_as_miss() {
    let cache = ChainBuilder::new()
        .backend(DownBackend)
        .backend(DownBackend)
        .build()
        .await
        .expect("Failed to build chain");

    let value: Option<String> = cache.get("anything").await.expect("Failed to get");
    assert!(value.is_none());
    assert!(!cache.forget("anything").await.expect("Failed to forget"));
    assert_eq!(cache.health_check().await, vec![false, false]);
}

#[tokio::test]
async fn test_remember_populates_every_tier() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let memory = InMemoryBackend::new();
    let disk = FileBackend::new(dir.path())
        .await
        .expect("Failed to open file backend");

    let cache = ChainBuilder::new()
        .backend(memory.clone())
        .backend(disk.clone())
        .with_config(ChainConfig::default().with_prefix("app"))
        .build()
        .await
        .expect("Failed to build chain");

    let value: u64 = cache
        .remember("report", Duration::from_secs(30), || async {
            Ok::<_, Error>(7)
        })
        .await
        .expect("Failed to remember");
    assert_eq!(value, 7);

    assert!(memory.exists("app:report").await.expect("Failed to check"));
    assert!(disk.exists("app:report").await.expect("Failed to check"));

    assert!(cache.forget("report").await.expect("Failed to forget"));
    assert!(!disk.exists("app:report").await.expect("Failed to check"));
}

#[tokio::test]
async fn test_registry_unknown_backend_is_reported_at_build() {
    let mut registry = BackendRegistry::with_defaults();
    registry.register("sessions", || async { Ok(InMemoryBackend::with_limit(100)) });

    let built = ChainBuilder::new()
        .with_registry(registry.clone())
        .named("sessions")
        .named("array")
        .build()
        .await;
    assert!(built.is_ok());

    let result = ChainBuilder::new()
        .with_registry(registry)
        .named("sessions")
        .named("apc")
        .build()
        .await;
    assert!(matches!(result, Err(Error::UnknownBackend(name)) if name == "apc"));
}
