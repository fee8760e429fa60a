//! Chain configuration.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// How back-fill writes are issued after a hit in a lower tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromotionMode {
    /// Await the back-fill writes before `get` returns. Each write is still
    /// bounded by `backend_timeout`.
    Inline,
    /// Issue back-fill writes on a spawned task; `get` returns as soon as
    /// the hit is found. Falls back to `Inline` outside a tokio runtime.
    #[default]
    Detached,
}

impl FromStr for PromotionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(PromotionMode::Inline),
            "detached" => Ok(PromotionMode::Detached),
            other => Err(Error::ConfigError(format!(
                "Unknown promotion mode: {} (expected inline or detached)",
                other
            ))),
        }
    }
}

/// Settings applied by [`ChainCache`](crate::ChainCache) to every operation.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    /// Namespace prepended to every key as `"{prefix}:{key}"`.
    pub prefix: Option<String>,
    /// Upper bound for a single backend call. Exceeding it counts as a
    /// backend fault for that tier only.
    pub backend_timeout: Option<Duration>,
    pub promotion: PromotionMode,
}

impl ChainConfig {
    /// Read overrides from the environment on top of the defaults.
    ///
    /// - `CACHE_CHAIN_PREFIX`: key namespace
    /// - `CACHE_CHAIN_TIMEOUT_MS`: per-backend timeout in milliseconds
    /// - `CACHE_CHAIN_PROMOTION`: `inline` or `detached`
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        let mut config = ChainConfig::default();

        if let Ok(prefix) = std::env::var("CACHE_CHAIN_PREFIX") {
            if !prefix.is_empty() {
                config.prefix = Some(prefix);
            }
        }

        if let Ok(raw) = std::env::var("CACHE_CHAIN_TIMEOUT_MS") {
            let ms = raw.parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("Invalid CACHE_CHAIN_TIMEOUT_MS {:?}: {}", raw, e))
            })?;
            config.backend_timeout = Some(Duration::from_millis(ms));
        }

        if let Ok(raw) = std::env::var("CACHE_CHAIN_PROMOTION") {
            config.promotion = raw.parse()?;
        }

        Ok(config)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = Some(timeout);
        self
    }

    pub fn with_promotion(mut self, mode: PromotionMode) -> Self {
        self.promotion = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert!(config.prefix.is_none());
        assert!(config.backend_timeout.is_none());
        assert_eq!(config.promotion, PromotionMode::Detached);
    }

    #[test]
    fn test_promotion_mode_parsing() {
        assert_eq!(
            "Detached".parse::<PromotionMode>().expect("Failed to parse"),
            PromotionMode::Detached
        );
        assert_eq!(
            " inline ".parse::<PromotionMode>().expect("Failed to parse"),
            PromotionMode::Inline
        );
        assert!(matches!(
            "eager".parse::<PromotionMode>(),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_builder_style_setters() {
        let config = ChainConfig::default()
            .with_prefix("app")
            .with_backend_timeout(Duration::from_millis(250))
            .with_promotion(PromotionMode::Inline);

        assert_eq!(config.prefix.as_deref(), Some("app"));
        assert_eq!(config.backend_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.promotion, PromotionMode::Inline);
    }
}
