//! Metrics hooks for chain operations.
//!
//! Per-backend failures never reach callers of the chain; implement
//! [`ChainMetrics`] to observe them.

use crate::error::{BackendOp, Error};
use std::time::Duration;

/// Receives events from [`ChainCache`](crate::ChainCache).
///
/// `tier` is the backend's position in the chain (0 = highest priority).
/// Every method defaults to doing nothing.
pub trait ChainMetrics: Send + Sync {
    /// A read was served by `tier`.
    fn record_hit(&self, _key: &str, _tier: usize, _duration: Duration) {}

    /// No tier held the key.
    fn record_miss(&self, _key: &str, _duration: Duration) {}

    /// A value found deeper in the chain was written back into `tier`.
    fn record_promotion(&self, _key: &str, _tier: usize) {}

    /// `tier` failed or timed out during `op`.
    fn record_backend_error(&self, _tier: usize, _op: BackendOp, _error: &Error) {}
}

/// Default metrics sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl ChainMetrics for NoOpMetrics {}
