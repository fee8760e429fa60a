//! In-memory cache backend.

use super::{CacheBackend, CacheEntry};
use crate::error::Result;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn remaining(&self, now: Instant) -> Option<Option<Duration>> {
        match self.expires_at {
            None => Some(None),
            Some(at) if at > now => Some(Some(at - now)),
            Some(_) => None,
        }
    }
}

/// Process-local backend backed by a concurrent hash map.
///
/// Expired entries are dropped lazily on access. With a limit, inserting a
/// new key into a full store evicts the oldest inserted key first.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
    insertion_order: Arc<Mutex<VecDeque<String>>>,
    limit: Option<usize>,
}

impl InMemoryBackend {
    /// Create an unbounded in-memory backend.
    pub fn new() -> Self {
        InMemoryBackend::default()
    }

    /// Create a backend holding at most `limit` keys.
    pub fn with_limit(limit: usize) -> Self {
        InMemoryBackend {
            limit: Some(limit.max(1)),
            ..InMemoryBackend::default()
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn order(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.insertion_order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn make_room(&self, key: &str) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.store.contains_key(key) {
            return;
        }

        let mut order = self.order();
        while self.store.len() >= limit {
            match order.pop_front() {
                Some(oldest) => {
                    if self.store.remove(&oldest).is_some() {
                        debug!("✓ Memory EVICT {} (limit: {})", oldest, limit);
                    }
                }
                None => break,
            }
        }
        order.push_back(key.to_string());
    }

    fn forget_order(&self, key: &str) {
        if self.limit.is_some() {
            self.order().retain(|k| k != key);
        }
    }
}

impl CacheBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = Instant::now();
        let found = self
            .store
            .get(key)
            .map(|stored| (stored.value.clone(), stored.remaining(now)));

        match found {
            Some((value, Some(ttl))) => {
                debug!("✓ Memory GET {} -> HIT", key);
                Ok(Some(CacheEntry::new(value, ttl)))
            }
            Some((_, None)) => {
                self.store
                    .remove_if(key, |_, stored| stored.remaining(now).is_none());
                self.forget_order(key);
                debug!("✓ Memory GET {} -> EXPIRED", key);
                Ok(None)
            }
            None => {
                debug!("✓ Memory GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.make_room(key);

        // A deadline past the clock's range never arrives.
        let expires_at = ttl.and_then(|d| Instant::now().checked_add(d));
        self.store
            .insert(key.to_string(), StoredValue { value, expires_at });

        match ttl {
            Some(d) => debug!("✓ Memory SET {} (TTL: {:?})", key, d),
            None => debug!("✓ Memory SET {}", key),
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        self.forget_order(key);
        debug!("✓ Memory DELETE {}", key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        self.order().clear();
        debug!("✓ Memory CLEAR");
        Ok(())
    }
}
