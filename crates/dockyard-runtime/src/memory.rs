//! In-process container runtime.
//!
//! Behaves like a Docker daemon that never runs anything: names are unique,
//! running containers cannot be removed, and unknown ids are `NotFound`.
//! Name filters match by substring, as Docker's do. Calls are recorded in a
//! bounded journal (oldest entries are dropped), and individual operations
//! can be made to fail.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{ContainerRecord, ContainerRuntime, RuntimeFuture};

/// Runtime operation kinds, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOp {
    List,
    Create,
    Start,
    Stop,
    Remove,
}

/// Journal entries kept by [`MemoryRuntime::new`].
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

/// One recorded call, addressed by container name so tests stay readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    List { filter: String },
    Create { name: String, image: String },
    Start { name: String },
    Stop { name: String },
    Remove { name: String },
}

#[derive(Debug, Default)]
struct Inner {
    /// Containers in creation order.
    containers: Vec<ContainerRecord>,
    next_id: u64,
    calls: VecDeque<RuntimeCall>,
    journal_capacity: usize,
    /// (operation, container name or list filter) pairs that must fail.
    failures: Vec<(RuntimeOp, String)>,
}

impl Inner {
    fn find(&self, id: &str) -> RuntimeResult<usize> {
        self.containers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    fn check_failure(&self, op: RuntimeOp, subject: &str) -> RuntimeResult<()> {
        if self.failures.iter().any(|(o, s)| *o == op && s == subject) {
            return Err(RuntimeError::Transport(format!(
                "injected {op:?} failure for {subject}"
            )));
        }
        Ok(())
    }

    fn record(&mut self, call: RuntimeCall) {
        if self.journal_capacity == 0 {
            return;
        }
        if self.calls.len() == self.journal_capacity {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    fn name_of(&self, id: &str) -> String {
        self.containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// In-memory [`ContainerRuntime`].
#[derive(Debug)]
pub struct MemoryRuntime {
    inner: Mutex<Inner>,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::with_journal_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` journal entries. Zero disables journaling.
    pub fn with_journal_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                journal_capacity: capacity,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a container directly, bypassing the journal. Returns its id.
    pub fn insert(&self, name: &str, image: &str, running: bool) -> String {
        self.insert_with_labels(name, image, running, BTreeMap::new())
    }

    /// Like [`insert`](Self::insert), with labels.
    pub fn insert_with_labels(
        &self,
        name: &str,
        image: &str,
        running: bool,
        labels: BTreeMap<String, String>,
    ) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("mem-{:04}", inner.next_id);
        inner.containers.push(ContainerRecord {
            id: id.clone(),
            name: name.to_string(),
            state: if running { "running" } else { "created" }.to_string(),
            image: Some(image.to_string()),
            labels,
        });
        id
    }

    /// Make every future `op` on `subject` fail with a transport error.
    ///
    /// `subject` is the container name, or the name filter for `List`.
    pub fn fail_on(&self, op: RuntimeOp, subject: &str) {
        self.lock().failures.push((op, subject.to_string()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Snapshot of all containers, in creation order.
    pub fn containers(&self) -> Vec<ContainerRecord> {
        self.lock().containers.clone()
    }

    pub fn container(&self, name: &str) -> Option<ContainerRecord> {
        self.lock().containers.iter().find(|c| c.name == name).cloned()
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Recorded calls other than `List`.
    pub fn mutations(&self) -> Vec<RuntimeCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, RuntimeCall::List { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn set_state(&self, op: RuntimeOp, id: &str, state: &str) -> RuntimeResult<()> {
        let mut inner = self.lock();
        let name = inner.name_of(id);
        inner.record(match op {
            RuntimeOp::Start => RuntimeCall::Start { name: name.clone() },
            _ => RuntimeCall::Stop { name: name.clone() },
        });
        inner.check_failure(op, &name)?;
        let idx = inner.find(id)?;
        inner.containers[idx].state = state.to_string();
        debug!(container = %name, state, "memory runtime state change");
        Ok(())
    }
}

impl ContainerRuntime for MemoryRuntime {
    fn list<'a>(
        &'a self,
        name_filter: &'a str,
        include_stopped: bool,
    ) -> RuntimeFuture<'a, Vec<ContainerRecord>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.record(RuntimeCall::List {
                filter: name_filter.to_string(),
            });
            inner.check_failure(RuntimeOp::List, name_filter)?;
            Ok(inner
                .containers
                .iter()
                .filter(|c| c.name.contains(name_filter))
                .filter(|c| include_stopped || c.is_running())
                .cloned()
                .collect())
        })
    }

    fn create<'a>(
        &'a self,
        name: &'a str,
        image: &'a str,
        labels: &'a BTreeMap<String, String>,
    ) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.record(RuntimeCall::Create {
                name: name.to_string(),
                image: image.to_string(),
            });
            inner.check_failure(RuntimeOp::Create, name)?;
            if inner.containers.iter().any(|c| c.name == name) {
                return Err(RuntimeError::Conflict(format!(
                    "container name '{name}' already in use"
                )));
            }
            inner.next_id += 1;
            let id = format!("mem-{:04}", inner.next_id);
            inner.containers.push(ContainerRecord {
                id: id.clone(),
                name: name.to_string(),
                state: "created".to_string(),
                image: Some(image.to_string()),
                labels: labels.clone(),
            });
            debug!(container = %name, %id, "memory runtime container created");
            Ok(id)
        })
    }

    fn start<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move { self.set_state(RuntimeOp::Start, container_id, "running") })
    }

    fn stop<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move { self.set_state(RuntimeOp::Stop, container_id, "exited") })
    }

    fn remove<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            let name = inner.name_of(container_id);
            inner.record(RuntimeCall::Remove { name: name.clone() });
            inner.check_failure(RuntimeOp::Remove, &name)?;
            let idx = inner.find(container_id)?;
            if inner.containers[idx].is_running() {
                return Err(RuntimeError::Conflict(format!(
                    "cannot remove running container '{name}'"
                )));
            }
            inner.containers.remove(idx);
            debug!(container = %name, "memory runtime container removed");
            Ok(())
        })
    }
}
