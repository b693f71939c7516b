//! Reconciliation error types.

use thiserror::Error;

use dockyard_core::DefinitionError;
use dockyard_runtime::RuntimeError;
use dockyard_state::{AppId, StateError};

use crate::plan::ActionKind;

/// Errors that can occur while reconciling an application.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("application not found: {0}")]
    NotFound(AppId),

    #[error("application already exists: {0}")]
    Conflict(String),

    /// The runtime could not be queried for a service's container.
    #[error("probing service '{service}' failed: {source}")]
    Probe {
        service: String,
        #[source]
        source: RuntimeError,
    },

    /// An action failed; the rest of the plan was not attempted.
    #[error("{action} of service '{service}' failed: {source}")]
    Action {
        action: ActionKind,
        service: String,
        #[source]
        source: RuntimeError,
    },
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
