//! # cache-chain
//!
//! A unified cache facade over an ordered chain of heterogeneous backends.
//!
//! ## Features
//!
//! - **Priority Reads:** Backends are consulted in order; the first hit wins
//! - **Promotion:** A hit in a lower tier is written back into the faster tiers that missed
//! - **Write Fan-out:** Writes and deletes go to every tier; the result is `true` only if all succeeded
//! - **Fault Isolation:** A failing or slow backend is skipped, never surfaced to the caller
//! - **Backend Agnostic:** In-memory, filesystem, Redis, Memcached, and custom backends
//!
//! ## Quick Start
//!
//! ```no_run
//! use cache_chain::ChainBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> cache_chain::Result<()> {
//! let cache = ChainBuilder::new()
//!     .memory()
//!     .file("/tmp/app-cache")
//!     .build()
//!     .await?;
//!
//! cache.put("user:1", &"Alice".to_string(), Duration::from_secs(60)).await?;
//! let name: Option<String> = cache.get("user:1").await?;
//!
//! let count: u64 = cache
//!     .remember("users:count", Duration::from_secs(30), || async {
//!         Ok::<_, cache_chain::Error>(42)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod key;
pub mod observability;
pub mod registry;
pub mod serialization;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use builder::ChainBuilder;
pub use chain::ChainCache;
pub use config::{ChainConfig, PromotionMode};
pub use error::{Error, Result};
pub use observability::{ChainMetrics, NoOpMetrics};
pub use registry::BackendRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
