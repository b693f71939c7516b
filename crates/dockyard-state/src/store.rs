//! StateStore — redb-backed application records for Dockyard.
//!
//! Provides typed CRUD over registered applications. All records are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use dockyard_core::{ApplicationDefinition, Fingerprint};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPS).map_err(map_err!(Table))?;
        txn.open_table(APP_NAMES).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Applications ───────────────────────────────────────────────

    /// Register a new application. Fails with `Conflict` if the name is taken.
    pub fn create(&self, definition: &ApplicationDefinition) -> StateResult<AppRecord> {
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record;
        {
            let mut names = txn.open_table(APP_NAMES).map_err(map_err!(Table))?;
            if names
                .get(definition.name.as_str())
                .map_err(map_err!(Read))?
                .is_some()
            {
                return Err(StateError::Conflict(format!(
                    "application '{}'",
                    definition.name
                )));
            }

            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let id = meta
                .get(NEXT_APP_ID)
                .map_err(map_err!(Read))?
                .map(|g| g.value())
                .unwrap_or(1);
            meta.insert(NEXT_APP_ID, id + 1).map_err(map_err!(Write))?;

            record = AppRecord {
                id,
                name: definition.name.clone(),
                script: definition.raw.clone(),
                fingerprint: definition.fingerprint.clone(),
                created_at: now,
                updated_at: now,
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;

            let mut apps = txn.open_table(APPS).map_err(map_err!(Table))?;
            apps.insert(id, value.as_slice()).map_err(map_err!(Write))?;
            names
                .insert(definition.name.as_str(), id)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = record.id, name = %record.name, "application stored");
        Ok(record)
    }

    /// Get an application by id.
    pub fn get(&self, id: AppId) -> StateResult<Option<AppRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: AppRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get an application by its unique name.
    pub fn get_by_name(&self, name: &str) -> StateResult<Option<AppRecord>> {
        let id = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let names = txn.open_table(APP_NAMES).map_err(map_err!(Table))?;
            names.get(name).map_err(map_err!(Read))?.map(|g| g.value())
        };
        match id {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    /// List all applications in id order.
    pub fn list(&self) -> StateResult<Vec<AppRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: AppRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Overwrite an application's raw payload and fingerprint.
    ///
    /// The write is unconditional: it happens whether or not the new payload
    /// differs in content. Returns false if the id is unknown.
    pub fn update(&self, id: AppId, script: &str, fingerprint: &Fingerprint) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut apps = txn.open_table(APPS).map_err(map_err!(Table))?;
            let mut record: AppRecord = match apps.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Ok(false),
            };
            record.script = script.to_string();
            record.fingerprint = fingerprint.clone();
            record.updated_at = epoch_secs();
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            apps.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, fingerprint = %fingerprint.short(), "application payload overwritten");
        Ok(true)
    }

    /// Delete an application by id. Returns true if it existed.
    pub fn delete(&self, id: AppId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut apps = txn.open_table(APPS).map_err(map_err!(Table))?;
            let removed: Option<AppRecord> = match apps.remove(id).map_err(map_err!(Write))? {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };
            existed = removed.is_some();
            if let Some(record) = removed {
                let mut names = txn.open_table(APP_NAMES).map_err(map_err!(Table))?;
                names
                    .remove(record.name.as_str())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "application deleted");
        Ok(existed)
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
