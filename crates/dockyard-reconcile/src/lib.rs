//! dockyard-reconcile — converge running containers to declared applications.
//!
//! Maps `ApplicationDefinition`s (from `dockyard-core`) onto containers in a
//! `ContainerRuntime` (from `dockyard-runtime`). Every operation is a single
//! probe → plan → execute sequence:
//!
//! - **`probe`** — classify each service's container (not created / not
//!   running / running)
//! - **`plan`** — turn probe results into ordered actions
//! - **`diff`** — fingerprint comparison across two definition generations
//! - **`executor`** — apply actions in order, stopping at the first failure
//! - **`reconciler`** — start, stop, teardown and update sequences
//! - **`controller`** — record store + reconciler, one in-flight operation
//!   per application
//!
//! # Architecture
//!
//! ```text
//! AppController
//!   ├── StateStore (AppRecord: raw payload + fingerprint)
//!   ├── AppLocks (one async mutex per application name)
//!   └── Reconciler
//!       └── ContainerRuntime (Docker or in-memory)
//! ```

pub mod controller;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lock;
pub mod plan;
pub mod probe;
pub mod reconciler;

pub use controller::{AppController, AppView};
pub use diff::{DefinitionDiff, Modification, Rename, diff_definitions};
pub use error::{ReconcileError, ReconcileResult};
pub use executor::{ExecutionReport, execute};
pub use lock::{AppGuard, AppLocks};
pub use plan::{Action, ActionKind, Plan, start_plan, stop_plan, teardown_plan};
pub use probe::{ContainerStatus, ServiceContainerLink, container_name, probe};
pub use reconciler::{Reconciler, UpdateReport};
