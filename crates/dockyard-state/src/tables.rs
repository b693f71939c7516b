//! redb table definitions for the Dockyard record store.

use redb::TableDefinition;

/// Application records keyed by numeric id.
pub const APPS: TableDefinition<u64, &[u8]> = TableDefinition::new("apps");

/// Name → id index; enforces unique application names.
pub const APP_NAMES: TableDefinition<&str, u64> = TableDefinition::new("app_names");

/// Store bookkeeping (id sequence).
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// `META` key holding the next id to hand out.
pub const NEXT_APP_ID: &str = "next_app_id";
