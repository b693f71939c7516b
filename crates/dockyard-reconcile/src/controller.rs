//! Application controller.
//!
//! Ties the record store, the definition parser and the reconciler together.
//! Every operation that touches containers runs under the application's lock,
//! and re-reads the record once the lock is held so it always acts on the
//! latest stored generation.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use dockyard_core::{ApplicationDefinition, parse_definition};
use dockyard_runtime::ContainerRuntime;
use dockyard_state::{AppId, AppRecord, StateError, StateStore};

use crate::error::{ReconcileError, ReconcileResult};
use crate::executor::ExecutionReport;
use crate::lock::{AppGuard, AppLocks};
use crate::probe::ServiceContainerLink;
use crate::reconciler::{Reconciler, UpdateReport};

/// A stored application together with its live container association.
#[derive(Debug, Clone, Serialize)]
pub struct AppView {
    pub record: AppRecord,
    pub services: Vec<ServiceContainerLink>,
}

#[derive(Clone)]
pub struct AppController {
    store: StateStore,
    reconciler: Reconciler,
    locks: AppLocks,
}

impl AppController {
    pub fn new(store: StateStore, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            store,
            reconciler: Reconciler::new(runtime),
            locks: AppLocks::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn locks(&self) -> &AppLocks {
        &self.locks
    }

    /// Parse, validate and persist a new application. Touches no containers.
    pub fn register(&self, raw: &str, name: Option<&str>) -> ReconcileResult<AppRecord> {
        let definition = parse_definition(raw, name.filter(|n| !n.is_empty()))?;
        let record = self.store.create(&definition).map_err(|e| match e {
            StateError::Conflict(_) => ReconcileError::Conflict(definition.name.clone()),
            other => other.into(),
        })?;
        info!(
            app = %record.name,
            id = record.id,
            services = definition.services.len(),
            fingerprint = %record.fingerprint.short(),
            "application registered"
        );
        Ok(record)
    }

    pub fn list(&self) -> ReconcileResult<Vec<AppRecord>> {
        Ok(self.store.list()?)
    }

    pub fn get(&self, id: AppId) -> ReconcileResult<AppRecord> {
        self.store.get(id)?.ok_or(ReconcileError::NotFound(id))
    }

    /// The record plus a fresh probe of its services. Does not lock.
    pub async fn inspect(&self, id: AppId) -> ReconcileResult<AppView> {
        let record = self.get(id)?;
        let definition = load_definition(&record)?;
        let services = self.reconciler.status(&definition).await?;
        Ok(AppView { record, services })
    }

    pub async fn start(&self, id: AppId) -> ReconcileResult<ExecutionReport> {
        let (_guard, record) = self.lock(id).await?;
        let definition = load_definition(&record)?;
        self.reconciler.start(&definition).await
    }

    pub async fn stop(&self, id: AppId) -> ReconcileResult<ExecutionReport> {
        let (_guard, record) = self.lock(id).await?;
        let definition = load_definition(&record)?;
        self.reconciler.stop(&definition).await
    }

    /// Replace the application's definition with `raw` and reconcile.
    ///
    /// The new payload is parsed under the stored name, then persisted
    /// (whether or not it differs) before any container is touched, so a
    /// failed reconciliation still leaves it as the record of truth.
    pub async fn update(&self, id: AppId, raw: &str) -> ReconcileResult<UpdateReport> {
        let (_guard, record) = self.lock(id).await?;
        let old = load_definition(&record)?;
        let new = parse_definition(raw, Some(&record.name))?;

        if !self.store.update(id, &new.raw, &new.fingerprint)? {
            return Err(ReconcileError::NotFound(id));
        }
        self.reconciler.update(&old, &new).await
    }

    /// Tear down the application's containers, then forget it.
    pub async fn delete(&self, id: AppId) -> ReconcileResult<ExecutionReport> {
        let (_guard, record) = self.lock(id).await?;
        let definition = load_definition(&record)?;
        let report = self.reconciler.teardown(&definition).await?;
        if !self.store.delete(id)? {
            return Err(ReconcileError::NotFound(id));
        }
        info!(app = %record.name, id, "application deleted");
        Ok(report)
    }

    /// Take the application's lock and return the record as of lock time.
    async fn lock(&self, id: AppId) -> ReconcileResult<(AppGuard, AppRecord)> {
        let name = self.get(id)?.name;
        let guard = self.locks.acquire(&name).await;
        // The record may have changed or vanished while we waited.
        let record = self.get(id)?;
        Ok((guard, record))
    }
}

fn load_definition(record: &AppRecord) -> ReconcileResult<ApplicationDefinition> {
    Ok(parse_definition(&record.script, Some(&record.name))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ActionKind;
    use crate::probe::ContainerStatus;
    use dockyard_core::DefinitionError;
    use dockyard_runtime::{MemoryRuntime, RuntimeCall};
    use std::time::Duration;

    const WEB: &str = "project_name: web\nservices:\n  api:\n    image: img:1\n";

    fn setup() -> (Arc<MemoryRuntime>, AppController) {
        let rt = Arc::new(MemoryRuntime::new());
        let store = StateStore::open_in_memory().unwrap();
        (rt.clone(), AppController::new(store, rt))
    }

    #[test]
    fn register_takes_name_from_payload() {
        let (rt, controller) = setup();
        let record = controller.register(WEB, None).unwrap();
        assert_eq!(record.name, "web");
        assert_eq!(record.id, 1);
        assert!(rt.calls().is_empty());
    }

    #[test]
    fn register_rejects_duplicates() {
        let (_rt, controller) = setup();
        controller.register(WEB, None).unwrap();
        let err = controller.register(WEB, None).unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict(name) if name == "web"));
    }

    #[test]
    fn register_rejects_bad_payloads() {
        let (_rt, controller) = setup();
        assert!(matches!(
            controller.register("", Some("web")),
            Err(ReconcileError::Definition(DefinitionError::Validation(_)))
        ));
        assert!(matches!(
            controller.register("services:\n  api:\n    image: img:1\n", None),
            Err(ReconcileError::Definition(DefinitionError::Parse(_)))
        ));
        assert!(controller.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_inspect_stop() {
        let (_rt, controller) = setup();
        let id = controller.register(WEB, None).unwrap().id;

        controller.start(id).await.unwrap();
        let view = controller.inspect(id).await.unwrap();
        assert_eq!(view.services[0].status, ContainerStatus::Running);

        controller.stop(id).await.unwrap();
        let view = controller.inspect(id).await.unwrap();
        assert_eq!(view.services[0].status, ContainerStatus::NotRunning);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (_rt, controller) = setup();
        assert!(matches!(controller.start(9).await, Err(ReconcileError::NotFound(9))));
        assert!(matches!(controller.inspect(9).await, Err(ReconcileError::NotFound(9))));
    }

    #[tokio::test]
    async fn update_persists_payload_and_fingerprint() {
        let (_rt, controller) = setup();
        let id = controller.register(WEB, None).unwrap().id;
        controller.start(id).await.unwrap();

        let raw = "services:\n  api:\n    image: img:2\n";
        let report = controller.update(id, raw).await.unwrap();
        assert!(report.did_update);

        let record = controller.get(id).unwrap();
        assert_eq!(record.script, raw);
        assert_eq!(record.fingerprint, report.new_fingerprint);
        assert_eq!(record.name, "web");
    }

    #[tokio::test]
    async fn unchanged_update_still_overwrites_payload() {
        let (rt, controller) = setup();
        let id = controller.register(WEB, None).unwrap().id;
        controller.start(id).await.unwrap();
        rt.clear_calls();

        // Same content, different formatting.
        let raw = "project_name: web\nservices:\n  api: {image: \"img:1\"}\n";
        let report = controller.update(id, raw).await.unwrap();
        assert!(!report.did_update);
        assert!(report.actions.is_empty());
        assert!(rt.mutations().is_empty());
        assert_eq!(controller.get(id).unwrap().script, raw);
    }

    #[tokio::test]
    async fn delete_tears_down_and_frees_name() {
        let (rt, controller) = setup();
        let id = controller.register(WEB, None).unwrap().id;
        controller.start(id).await.unwrap();

        let report = controller.delete(id).await.unwrap();
        let kinds: Vec<_> = report.actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::Stop, ActionKind::Remove]);
        assert!(rt.containers().is_empty());
        assert!(matches!(controller.get(id), Err(ReconcileError::NotFound(_))));

        controller.register(WEB, None).unwrap();
    }

    #[tokio::test]
    async fn delete_spares_container_with_colliding_name() {
        let (rt, controller) = setup();
        // Both applications map a service onto `web_api_x`.
        let web = controller
            .register("services:\n  api_x:\n    image: img:1\n", Some("web"))
            .unwrap()
            .id;
        let web_api = controller
            .register("services:\n  x:\n    image: img:1\n", Some("web_api"))
            .unwrap()
            .id;
        controller.start(web).await.unwrap();
        rt.clear_calls();

        let view = controller.inspect(web_api).await.unwrap();
        assert_eq!(view.services[0].status, ContainerStatus::NotCreated);

        let report = controller.delete(web_api).await.unwrap();
        let kinds: Vec<_> = report.actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::Noop]);
        assert!(rt.mutations().is_empty());

        assert!(rt.container("web_api_x").unwrap().is_running());
        let view = controller.inspect(web).await.unwrap();
        assert_eq!(view.services[0].status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn operations_on_one_app_are_serialized() {
        let (rt, controller) = setup();
        let id = controller.register(WEB, None).unwrap().id;

        let guard = controller.locks().acquire("web").await;
        let task = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .update(id, "services:\n  api:\n    image: img:2\n")
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert!(rt.calls().is_empty());
        assert_eq!(controller.get(id).unwrap().script, WEB);

        drop(guard);
        let report = task.await.unwrap().unwrap();
        assert!(report.did_update);
        assert_eq!(
            rt.mutations(),
            vec![
                RuntimeCall::Create { name: "web_api".into(), image: "img:2".into() },
                RuntimeCall::Start { name: "web_api".into() },
            ]
        );
    }

    #[tokio::test]
    async fn other_apps_are_not_blocked() {
        let (_rt, controller) = setup();
        controller.register(WEB, None).unwrap();
        let shop = controller
            .register("services:\n  db:\n    image: pg:16\n", Some("shop"))
            .unwrap()
            .id;

        let _guard = controller.locks().acquire("web").await;
        let started = tokio::time::timeout(Duration::from_secs(1), controller.start(shop)).await;
        assert!(started.unwrap().is_ok());
    }
}
