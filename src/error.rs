//! Error types for cache-chain.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by backends, the chain facade and the builder.
///
/// Backend faults (`BackendError`, `Timeout`, `Io`) are recovered by
/// [`ChainCache`](crate::ChainCache): reads degrade to a miss and writes to a
/// `false` outcome. Only key, envelope and construction errors reach callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single backend failed (connection error, protocol error, ...).
    #[error("Backend error: {0}")]
    BackendError(String),

    /// A backend call exceeded the configured per-backend timeout.
    #[error("Backend timeout: {0}")]
    Timeout(String),

    /// Key rejected before any backend was touched.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Stored bytes are not a cache-chain envelope.
    #[error("Invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    /// Envelope written by a different schema version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Registry lookup for a backend name that was never registered.
    #[error("Unknown cache backend: {0}")]
    UnknownBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that describe a single backend being unavailable.
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_) | Error::Timeout(_) | Error::Io(_)
        )
    }
}

/// Backend operation names, used when reporting faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Get,
    Set,
    Delete,
    Exists,
    Clear,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendOp::Get => "GET",
            BackendOp::Set => "SET",
            BackendOp::Delete => "DELETE",
            BackendOp::Exists => "EXISTS",
            BackendOp::Clear => "CLEAR",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_fault_classification() {
        assert!(Error::BackendError("down".to_string()).is_backend_fault());
        assert!(Error::Timeout("slow".to_string()).is_backend_fault());
        assert!(!Error::InvalidKey("".to_string()).is_backend_fault());
        assert!(!Error::UnknownBackend("apc".to_string()).is_backend_fault());
    }

    #[test]
    fn test_error_display() {
        let err = Error::VersionMismatch {
            expected: 1,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: expected 1, found 7"
        );
        assert_eq!(BackendOp::Delete.to_string(), "DELETE");
    }
}
