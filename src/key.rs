//! Cache key validation and namespacing.

use crate::error::{Error, Result};

/// Longest key accepted, matching the Memcached protocol limit.
pub const MAX_KEY_LEN: usize = 250;

/// Characters no backend key may contain.
pub const RESERVED_CHARS: &[char] = &['{', '}', '(', ')', '/', '\\', '@'];

/// Check a caller-supplied key.
///
/// Legal keys are non-empty, at most [`MAX_KEY_LEN`] bytes, and contain no
/// whitespace, control characters or [`RESERVED_CHARS`]. `:` is allowed so
/// keys like `user:42` keep working.
///
/// # Errors
///
/// Returns `Error::InvalidKey` describing the first violation found.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty".to_string()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }

    if let Some(c) = key
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || RESERVED_CHARS.contains(c))
    {
        return Err(Error::InvalidKey(format!(
            "key {:?} contains illegal character {:?}",
            key, c
        )));
    }

    Ok(())
}

/// Builds the key actually sent to backends.
///
/// Format: `"{prefix}:{key}"`, or the bare key when no prefix is configured.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Validate `key` and apply the optional namespace prefix.
    pub fn build(prefix: Option<&str>, key: &str) -> Result<String> {
        validate_key(key)?;

        let full = match prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        };

        if full.len() > MAX_KEY_LEN {
            return Err(Error::InvalidKey(format!(
                "prefixed key {:?} exceeds {} bytes",
                full, MAX_KEY_LEN
            )));
        }

        Ok(full)
    }
}
