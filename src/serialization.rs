//! Versioned envelope for values stored in cache backends.
//!
//! Every value is encoded once per write and the same bytes are fanned out to
//! all backends, so promotion can copy raw bytes between tiers untouched.
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: u32 LE] [POSTCARD PAYLOAD]
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Envelope magic header.
pub const CACHE_MAGIC: [u8; 4] = *b"CCHN";

/// Bump when the payload layout changes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Encode a value into an envelope.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload =
        postcard::to_allocvec(value).map_err(|e| Error::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CACHE_MAGIC);
    bytes.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode an envelope, validating magic and schema version first.
///
/// # Errors
///
/// - `Error::InvalidCacheEntry`: too short or bad magic
/// - `Error::VersionMismatch`: written by another schema version
/// - `Error::DeserializationError`: payload does not decode as `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidCacheEntry(format!(
            "envelope too short: {} bytes",
            bytes.len()
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..4] != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "bad magic header: {:?}",
            &header[..4]
        )));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..]);
    let found = u32::from_le_bytes(version);
    if found != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found,
        });
    }

    postcard::from_bytes(payload).map_err(|e| Error::DeserializationError(e.to_string()))
}
