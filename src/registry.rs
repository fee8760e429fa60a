//! Named backend constructors.
//!
//! A [`BackendRegistry`] maps an identifier to an async constructor. It is an
//! ordinary value handed to [`ChainBuilder`](crate::ChainBuilder); there is
//! no process-wide table.

use crate::backend::{shared, CacheBackend, InMemoryBackend, SharedBackend, VoidBackend};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Erased async constructor stored in the registry.
pub type BackendFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<SharedBackend>> + Send + Sync>;

/// Mapping from backend name to constructor.
///
/// # Example
///
/// ```
/// use cache_chain::backend::InMemoryBackend;
/// use cache_chain::registry::BackendRegistry;
///
/// let mut registry = BackendRegistry::new();
/// registry.register("sessions", || async { Ok(InMemoryBackend::with_limit(10_000)) });
/// assert!(registry.contains("sessions"));
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BackendRegistry::default()
    }

    /// Registry preloaded with the dependency-free backends:
    /// `memory` (alias `array`) and `void`.
    pub fn with_defaults() -> Self {
        let mut registry = BackendRegistry::new();
        registry
            .register("memory", || async { Ok(InMemoryBackend::new()) })
            .register("array", || async { Ok(InMemoryBackend::new()) })
            .register("void", || async { Ok(VoidBackend::new()) });
        registry
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<B, F, Fut>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        B: CacheBackend + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<B>> + Send + 'static,
    {
        let name = name.into();
        let factory: BackendFactory =
            Arc::new(move || -> BoxFuture<'static, Result<SharedBackend>> {
                let pending = factory();
                Box::pin(async move { Ok(shared(pending.await?)) })
            });

        if self.factories.insert(name.clone(), factory).is_some() {
            debug!("Backend constructor {} replaced", name);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownBackend`: nothing registered under `name`
    /// - any error returned by the constructor itself
    pub async fn resolve(&self, name: &str) -> Result<SharedBackend> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))?;

        let backend = factory().await?;
        debug!("✓ Resolved backend {} -> {}", name, backend.backend_name());
        Ok(backend)
    }
}
