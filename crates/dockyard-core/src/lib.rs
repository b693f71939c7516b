//! dockyard-core — desired-state model for Dockyard.
//!
//! - **`types`** — `ApplicationDefinition`, `ServiceSpec`, `VolumeMount`
//! - **`compose`** — compose YAML → `ApplicationDefinition`
//! - **`fingerprint`** — deterministic content digests for change detection
//! - **`config`** — `dockyard.toml` daemon configuration

pub mod compose;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use compose::parse_definition;
pub use config::DaemonConfig;
pub use error::{DefinitionError, DefinitionResult};
pub use fingerprint::{Fingerprint, FingerprintError, fingerprint};
pub use types::*;
