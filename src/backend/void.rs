//! Backend that stores nothing.

use super::{CacheBackend, CacheEntry};
use crate::error::Result;
use std::time::Duration;

/// Accepts every write and never returns a hit.
///
/// Useful for switching caching off without changing call sites.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoidBackend;

impl VoidBackend {
    pub fn new() -> Self {
        VoidBackend
    }
}

impl CacheBackend for VoidBackend {
    fn name(&self) -> &'static str {
        "void"
    }

    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}
