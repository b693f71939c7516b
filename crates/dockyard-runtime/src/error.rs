//! Runtime client error types.

use thiserror::Error;

/// Result type alias for runtime calls.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by a container runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// Connectivity, permission or any other failure talking to the runtime.
    #[error("runtime transport error: {0}")]
    Transport(String),

    /// The referenced container does not exist.
    #[error("container not found: {0}")]
    NotFound(String),

    /// The runtime refused the call given the container's current state
    /// (name already in use, removing a running container, ...).
    #[error("runtime conflict: {0}")]
    Conflict(String),
}
