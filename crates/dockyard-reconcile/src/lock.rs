//! Per-application operation locks.
//!
//! At most one start, stop, update or delete runs per application at a
//! time. Different applications never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Held for the duration of one operation on one application.
pub type AppGuard = OwnedMutexGuard<()>;

/// Registry of per-application async mutexes, keyed by application name.
#[derive(Debug, Clone, Default)]
pub struct AppLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `app`.
    pub async fn acquire(&self, app: &str) -> AppGuard {
        let lock = {
            let mut table = self.table();
            // Drop entries nobody holds or waits on.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(app.to_string()).or_default().clone()
        };
        trace!(app, "waiting for application lock");
        lock.lock_owned().await
    }

    /// Whether an operation on `app` currently holds its lock.
    pub fn is_locked(&self, app: &str) -> bool {
        self.table()
            .get(app)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
