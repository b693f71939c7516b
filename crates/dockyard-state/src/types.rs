//! Persisted record types.

use serde::{Deserialize, Serialize};

use dockyard_core::Fingerprint;

/// Store-assigned application identifier.
pub type AppId = u64;

/// One registered application as stored.
///
/// Only the raw payload is kept; the parsed definition is rebuilt from it
/// on every read so parser changes never leave stale derived state behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppRecord {
    pub id: AppId,
    pub name: String,
    /// Raw compose payload of the current generation.
    pub script: String,
    /// Whole-definition fingerprint of `script`.
    pub fingerprint: Fingerprint,
    /// Unix timestamp (seconds) of registration.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last payload overwrite.
    pub updated_at: u64,
}
