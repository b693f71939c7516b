//! Plan execution.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use dockyard_runtime::{ContainerRuntime, LABEL_APP, LABEL_SERVICE};

use crate::error::{ReconcileError, ReconcileResult};
use crate::plan::{Action, Plan};

/// Outcome of a fully executed plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Every action of the plan, no-ops included, in execution order.
    pub actions: Vec<Action>,
    /// Count of actions that mutated the runtime.
    pub changed: usize,
}

impl ExecutionReport {
    pub fn merge(&mut self, other: ExecutionReport) {
        self.actions.extend(other.actions);
        self.changed += other.changed;
    }
}

/// Apply `plan` in order, one action at a time.
///
/// The first failure aborts the run: later actions are not attempted and
/// earlier ones are not rolled back.
pub async fn execute(
    runtime: &dyn ContainerRuntime,
    app_name: &str,
    plan: Plan,
) -> ReconcileResult<ExecutionReport> {
    let total = plan.len();
    let mut report = ExecutionReport::default();

    for (index, action) in plan.into_iter().enumerate() {
        if let Err(source) = apply(runtime, app_name, &action).await {
            warn!(
                app = %app_name,
                service = %action.service(),
                action = %action.kind(),
                completed = index,
                skipped = total - index - 1,
                error = %source,
                "action failed, aborting plan"
            );
            return Err(ReconcileError::Action {
                action: action.kind(),
                service: action.service().to_string(),
                source,
            });
        }
        if !action.is_noop() {
            report.changed += 1;
        }
        report.actions.push(action);
    }

    Ok(report)
}

async fn apply(
    runtime: &dyn ContainerRuntime,
    app_name: &str,
    action: &Action,
) -> Result<(), dockyard_runtime::RuntimeError> {
    match action {
        Action::Noop { .. } => Ok(()),
        Action::CreateAndStart {
            service,
            container_name,
            image,
        } => {
            let labels = BTreeMap::from([
                (LABEL_APP.to_string(), app_name.to_string()),
                (LABEL_SERVICE.to_string(), service.clone()),
            ]);
            let id = runtime.create(container_name, image, &labels).await?;
            runtime.start(&id).await?;
            info!(app = %app_name, %service, container = %container_name, %image, "container created and started");
            Ok(())
        }
        Action::Start {
            service,
            container_id,
        } => {
            runtime.start(container_id).await?;
            info!(app = %app_name, %service, container = %container_id, "container started");
            Ok(())
        }
        Action::Stop {
            service,
            container_id,
        } => {
            runtime.stop(container_id).await?;
            info!(app = %app_name, %service, container = %container_id, "container stopped");
            Ok(())
        }
        Action::Remove {
            service,
            container_id,
        } => {
            runtime.remove(container_id).await?;
            info!(app = %app_name, %service, container = %container_id, "container removed");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ActionKind;
    use dockyard_runtime::{MemoryRuntime, RuntimeCall, RuntimeOp};

    #[tokio::test]
    async fn create_and_start_labels_the_container() {
        let rt = MemoryRuntime::new();
        let plan = Plan::new(vec![Action::CreateAndStart {
            service: "api".into(),
            container_name: "web_api".into(),
            image: "img:1".into(),
        }]);

        let report = execute(&rt, "web", plan).await.unwrap();
        assert_eq!(report.changed, 1);

        let container = rt.container("web_api").unwrap();
        assert!(container.is_running());
        assert_eq!(container.labels.get(LABEL_APP).map(String::as_str), Some("web"));
        assert_eq!(container.labels.get(LABEL_SERVICE).map(String::as_str), Some("api"));
    }

    #[tokio::test]
    async fn noops_are_reported_but_not_executed() {
        let rt = MemoryRuntime::new();
        let plan = Plan::new(vec![
            Action::Noop { service: "api".into() },
            Action::Noop { service: "db".into() },
        ]);
        let report = execute(&rt, "web", plan).await.unwrap();
        assert_eq!(report.actions.len(), 2);
        assert_eq!(report.changed, 0);
        assert!(rt.calls().is_empty());
    }

    #[tokio::test]
    async fn first_failure_stops_the_plan() {
        let rt = MemoryRuntime::new();
        let api = rt.insert("web_api", "img:1", true);
        let db = rt.insert("web_db", "pg:16", true);
        let cache = rt.insert("web_cache", "redis:7", true);
        rt.fail_on(RuntimeOp::Stop, "web_db");

        let plan = Plan::new(vec![
            Action::Stop { service: "api".into(), container_id: api },
            Action::Stop { service: "db".into(), container_id: db },
            Action::Stop { service: "cache".into(), container_id: cache },
        ]);
        let err = execute(&rt, "web", plan).await.unwrap_err();
        match err {
            ReconcileError::Action { action, service, .. } => {
                assert_eq!(action, ActionKind::Stop);
                assert_eq!(service, "db");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            rt.mutations(),
            vec![
                RuntimeCall::Stop { name: "web_api".into() },
                RuntimeCall::Stop { name: "web_db".into() },
            ]
        );
        // Completed actions stay applied.
        assert!(!rt.container("web_api").unwrap().is_running());
        assert!(rt.container("web_cache").unwrap().is_running());
    }

    #[tokio::test]
    async fn create_conflict_surfaces() {
        let rt = MemoryRuntime::new();
        rt.insert("web_api", "img:1", false);
        let plan = Plan::new(vec![Action::CreateAndStart {
            service: "api".into(),
            container_name: "web_api".into(),
            image: "img:1".into(),
        }]);
        let err = execute(&rt, "web", plan).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Action { action: ActionKind::CreateAndStart, .. }
        ));
    }
}
