//! Content fingerprints for change detection.
//!
//! A fingerprint is the hex-encoded SHA-256 of a value's canonical JSON
//! encoding. The value is first lifted into a `serde_json::Value`, whose
//! object maps are key-sorted, so two values that differ only in the order
//! their fields or map entries were produced hash identically.
//!
//! Fingerprinting is a plain function over its input: every call builds its
//! own hasher, so it can be used from any number of tasks at once.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced while fingerprinting a value.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("value cannot be encoded for fingerprinting: {0}")]
    Encode(String),
}

/// Hex-encoded SHA-256 content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest (e.g. read back from the store).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the content fingerprint of any serializable value.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<Fingerprint, FingerprintError> {
    let bytes = canonical_bytes(value)?;
    Ok(Fingerprint(hex::encode(Sha256::digest(&bytes))))
}

/// Canonical byte encoding: compact JSON with object keys in sorted order.
fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FingerprintError> {
    // serde_json::Map is a BTreeMap unless `preserve_order` is enabled, which
    // this workspace never turns on.
    let canonical =
        serde_json::to_value(value).map_err(|e| FingerprintError::Encode(e.to_string()))?;
    serde_json::to_vec(&canonical).map_err(|e| FingerprintError::Encode(e.to_string()))
}
