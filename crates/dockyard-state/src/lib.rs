//! dockyard-state — application record store for Dockyard.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage of registered applications.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns, keyed by a
//! store-assigned numeric id. A second table indexes ids by application name
//! so names stay unique, and a `meta` table holds the id sequence.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
