//! Error types for application definitions.

use thiserror::Error;

use crate::fingerprint::FingerprintError;

/// Result type alias for definition parsing and validation.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Errors raised before any runtime interaction takes place.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// Malformed or empty application name, empty payload, empty fingerprint.
    #[error("invalid application: {0}")]
    Validation(String),

    /// The payload is not a well-formed compose definition.
    #[error("invalid definition: {0}")]
    Parse(String),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}
