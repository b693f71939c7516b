//! dockyard-runtime — container runtime client for Dockyard.
//!
//! Defines the [`ContainerRuntime`] seam the reconciler drives, with two
//! implementations:
//!
//! - **`docker`** — [`DockerRuntime`], talking to a Docker daemon via bollard
//! - **`memory`** — [`MemoryRuntime`], an in-process runtime with a call
//!   journal and failure injection, used by tests and dry runs
//!
//! Every call is request-scoped: nothing observed through this trait is
//! cached between calls.

pub mod docker;
pub mod error;
pub mod memory;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use memory::{MemoryRuntime, RuntimeCall, RuntimeOp};

/// Label carrying the owning application's name.
pub const LABEL_APP: &str = "dockyard.app";
/// Label carrying the service name within the application.
pub const LABEL_SERVICE: &str = "dockyard.service";

/// Boxed future returned by [`ContainerRuntime`] methods.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = RuntimeResult<T>> + Send + 'a>>;

/// A container as observed in the runtime. Read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    /// Container name without Docker's leading `/`.
    pub name: String,
    /// Raw runtime state (`running`, `exited`, `created`, ...).
    pub state: String,
    pub image: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ContainerRecord {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Lifecycle primitives of a container runtime.
///
/// Implementations must be shareable across tasks; the reconciler holds one
/// behind an `Arc` and serializes work per application itself.
pub trait ContainerRuntime: Send + Sync {
    /// List containers whose name matches `name_filter`. The match may be
    /// loose (Docker treats the filter as a pattern); callers needing an
    /// exact match must filter the result.
    fn list<'a>(
        &'a self,
        name_filter: &'a str,
        include_stopped: bool,
    ) -> RuntimeFuture<'a, Vec<ContainerRecord>>;

    /// Create (but do not start) a container. Returns the new container id.
    fn create<'a>(
        &'a self,
        name: &'a str,
        image: &'a str,
        labels: &'a BTreeMap<String, String>,
    ) -> RuntimeFuture<'a, String>;

    fn start<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()>;

    fn stop<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()>;

    fn remove<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()>;
}
