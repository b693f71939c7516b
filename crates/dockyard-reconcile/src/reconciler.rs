//! Reconciliation sequences.
//!
//! Each operation probes the runtime from scratch, plans, then executes.
//! Nothing observed is cached between calls, so re-running an operation
//! after a partial failure converges from whatever state was left behind.
//! The reconciler does no locking; callers serialize work per application
//! (see [`crate::AppController`]).

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use dockyard_core::{ApplicationDefinition, DefinitionError, Fingerprint};
use dockyard_runtime::ContainerRuntime;

use crate::diff::{DefinitionDiff, diff_definitions};
use crate::error::ReconcileResult;
use crate::executor::{ExecutionReport, execute};
use crate::plan::{Action, start_plan, stop_plan, teardown_plan};
use crate::probe::{ServiceContainerLink, probe};

/// Outcome of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub old_fingerprint: Fingerprint,
    pub new_fingerprint: Fingerprint,
    /// False when the fingerprints matched and nothing was touched.
    pub did_update: bool,
    /// Present only when the definitions differ.
    pub diff: Option<DefinitionDiff>,
    /// Teardown actions followed by recreate actions.
    pub actions: Vec<Action>,
    pub changed: usize,
}

/// Drives a [`ContainerRuntime`] towards declared definitions.
#[derive(Clone)]
pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
}

impl Reconciler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    /// Current container association of every service.
    pub async fn status(
        &self,
        definition: &ApplicationDefinition,
    ) -> ReconcileResult<Vec<ServiceContainerLink>> {
        probe(self.runtime(), &definition.name, &definition.services).await
    }

    /// Bring every service to running.
    pub async fn start(&self, definition: &ApplicationDefinition) -> ReconcileResult<ExecutionReport> {
        let links = self.status(definition).await?;
        let plan = start_plan(&definition.name, &links);
        debug!(app = %definition.name, actions = plan.len(), changed = plan.changed(), "start planned");
        let report = execute(self.runtime(), &definition.name, plan).await?;
        info!(app = %definition.name, changed = report.changed, "application started");
        Ok(report)
    }

    /// Stop running services, keeping their containers.
    pub async fn stop(&self, definition: &ApplicationDefinition) -> ReconcileResult<ExecutionReport> {
        let links = self.status(definition).await?;
        let plan = stop_plan(&links);
        debug!(app = %definition.name, actions = plan.len(), changed = plan.changed(), "stop planned");
        let report = execute(self.runtime(), &definition.name, plan).await?;
        info!(app = %definition.name, changed = report.changed, "application stopped");
        Ok(report)
    }

    /// Stop and remove every service's container.
    pub async fn teardown(
        &self,
        definition: &ApplicationDefinition,
    ) -> ReconcileResult<ExecutionReport> {
        let links = self.status(definition).await?;
        let plan = teardown_plan(&links);
        debug!(app = %definition.name, actions = plan.len(), changed = plan.changed(), "teardown planned");
        let report = execute(self.runtime(), &definition.name, plan).await?;
        info!(app = %definition.name, changed = report.changed, "application torn down");
        Ok(report)
    }

    /// Replace `old` with `new`.
    ///
    /// Matching fingerprints short-circuit to an empty report. Otherwise every
    /// old container is torn down, then the new services are probed again and
    /// started. Both generations must belong to the same application.
    pub async fn update(
        &self,
        old: &ApplicationDefinition,
        new: &ApplicationDefinition,
    ) -> ReconcileResult<UpdateReport> {
        if old.name != new.name {
            return Err(DefinitionError::Validation(format!(
                "cannot update application '{}' with a definition named '{}'",
                old.name, new.name
            ))
            .into());
        }

        if old.fingerprint == new.fingerprint {
            info!(
                app = %new.name,
                fingerprint = %new.fingerprint.short(),
                "definition unchanged, nothing to update"
            );
            return Ok(UpdateReport {
                old_fingerprint: old.fingerprint.clone(),
                new_fingerprint: new.fingerprint.clone(),
                did_update: false,
                diff: None,
                actions: Vec::new(),
                changed: 0,
            });
        }

        let diff = diff_definitions(old, new)?;
        info!(
            app = %new.name,
            old = %diff.old_fingerprint.short(),
            new = %diff.new_fingerprint.short(),
            renamed = diff.renamed.len(),
            modified = diff.modified.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "definition changed, replacing application"
        );
        for rename in &diff.renamed {
            debug!(app = %new.name, from = %rename.from, to = %rename.to, "service renamed");
        }
        for modification in &diff.modified {
            debug!(
                app = %new.name,
                service = %modification.service,
                old = %modification.old.short(),
                new = %modification.new.short(),
                "service modified"
            );
        }

        let mut report = self.teardown(old).await?;
        // Probe afresh: the old generation's containers are gone now.
        report.merge(self.start(new).await?);

        Ok(UpdateReport {
            old_fingerprint: old.fingerprint.clone(),
            new_fingerprint: new.fingerprint.clone(),
            did_update: true,
            diff: Some(diff),
            actions: report.actions,
            changed: report.changed,
        })
    }
}
