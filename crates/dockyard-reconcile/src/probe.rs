//! Container state probe.
//!
//! Joins desired services to runtime containers by name: the container for
//! service `S` of application `A` is named exactly `A_S`. The runtime's name
//! filter is only a pre-filter; a container counts as a match only when its
//! name is equal to the expected one, so `web_api` never picks up
//! `web_api_v2` or `myweb_api`.
//!
//! Names alone can collide (`web` + `api_x` and `web_api` + `x` both give
//! `web_api_x`), so the ownership labels set at creation are checked too. A
//! container labelled for another application or service is never matched.
//! Unlabelled containers are accepted.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dockyard_core::ServiceSpec;
use dockyard_runtime::{ContainerRecord, ContainerRuntime, LABEL_APP, LABEL_SERVICE};

use crate::error::{ReconcileError, ReconcileResult};

/// Observed status of one service's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    NotCreated,
    NotRunning,
    Running,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::NotCreated => "not created",
            ContainerStatus::NotRunning => "not running",
            ContainerStatus::Running => "running",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One service paired with the container currently backing it, if any.
///
/// Computed fresh on every probe and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceContainerLink {
    pub service: ServiceSpec,
    pub container: Option<ContainerRecord>,
    pub status: ContainerStatus,
}

/// Runtime container name for a service of an application.
pub fn container_name(app_name: &str, service_name: &str) -> String {
    format!("{app_name}_{service_name}")
}

/// Classify a (possibly absent) container.
pub fn classify(container: Option<&ContainerRecord>) -> ContainerStatus {
    match container {
        None => ContainerStatus::NotCreated,
        Some(c) if c.is_running() => ContainerStatus::Running,
        Some(_) => ContainerStatus::NotRunning,
    }
}

/// Whether a container's ownership labels, where present, name this
/// application and service.
fn owned_by(container: &ContainerRecord, app_name: &str, service_name: &str) -> bool {
    let label_is = |key: &str, expected: &str| {
        container
            .labels
            .get(key)
            .is_none_or(|value| value == expected)
    };
    label_is(LABEL_APP, app_name) && label_is(LABEL_SERVICE, service_name)
}

/// Query the runtime for each service's container, stopped ones included.
///
/// Returns one link per service, in input order. Issues no mutating calls
/// and does not retry: the first failed query aborts the probe.
pub async fn probe(
    runtime: &dyn ContainerRuntime,
    app_name: &str,
    services: &[ServiceSpec],
) -> ReconcileResult<Vec<ServiceContainerLink>> {
    let mut links = Vec::with_capacity(services.len());
    for service in services {
        let expected = container_name(app_name, &service.name);
        let candidates =
            runtime
                .list(&expected, true)
                .await
                .map_err(|source| ReconcileError::Probe {
                    service: service.name.clone(),
                    source,
                })?;

        let mut matches = candidates
            .into_iter()
            .filter(|c| c.name == expected)
            .filter(|c| {
                let owned = owned_by(c, app_name, &service.name);
                if !owned {
                    warn!(
                        app = %app_name,
                        service = %service.name,
                        container = %c.id,
                        owner_app = c.labels.get(LABEL_APP).map(String::as_str).unwrap_or(""),
                        owner_service = c.labels.get(LABEL_SERVICE).map(String::as_str).unwrap_or(""),
                        "container name matches but labels name another owner, ignoring it"
                    );
                }
                owned
            });
        let container = matches.next();
        let extra = matches.count();
        if extra > 0 {
            warn!(
                app = %app_name,
                service = %service.name,
                container = %expected,
                extra,
                "multiple containers share the service name, using the first"
            );
        }

        let status = classify(container.as_ref());
        debug!(app = %app_name, service = %service.name, %status, "probed service");
        links.push(ServiceContainerLink {
            service: service.clone(),
            container,
            status,
        });
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_runtime::{MemoryRuntime, RuntimeOp};
    use std::collections::BTreeMap;

    fn service(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            image: "img:1".to_string(),
            volumes: vec![],
            attributes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn classifies_each_state() {
        let rt = MemoryRuntime::new();
        rt.insert("web_db", "pg:16", false);
        rt.insert("web_cache", "redis:7", true);

        let services = [service("api"), service("db"), service("cache")];
        let links = probe(&rt, "web", &services).await.unwrap();

        let statuses: Vec<_> = links.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            [
                ContainerStatus::NotCreated,
                ContainerStatus::NotRunning,
                ContainerStatus::Running
            ]
        );
        assert!(links[0].container.is_none());
        assert_eq!(links[1].container.as_ref().unwrap().name, "web_db");
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let rt = MemoryRuntime::new();
        let services = [service("zeta"), service("alpha")];
        let links = probe(&rt, "web", &services).await.unwrap();
        assert_eq!(links[0].service.name, "zeta");
        assert_eq!(links[1].service.name, "alpha");
    }

    #[tokio::test]
    async fn substring_matches_are_ignored() {
        let rt = MemoryRuntime::new();
        rt.insert("web_api_v2", "img:1", true);
        rt.insert("myweb_api", "img:1", true);

        let links = probe(&rt, "web", &[service("api")]).await.unwrap();
        assert_eq!(links[0].status, ContainerStatus::NotCreated);
    }

    fn owner_labels(app: &str, service: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_APP.to_string(), app.to_string()),
            (LABEL_SERVICE.to_string(), service.to_string()),
        ])
    }

    #[tokio::test]
    async fn colliding_name_owned_by_other_app_is_ignored() {
        // `web` + `api_x` and `web_api` + `x` share the container name.
        let rt = MemoryRuntime::new();
        rt.insert_with_labels("web_api_x", "img:1", true, owner_labels("web", "api_x"));

        let links = probe(&rt, "web_api", &[service("x")]).await.unwrap();
        assert_eq!(links[0].status, ContainerStatus::NotCreated);
        assert!(links[0].container.is_none());

        let links = probe(&rt, "web", &[service("api_x")]).await.unwrap();
        assert_eq!(links[0].status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn unlabelled_container_is_accepted() {
        let rt = MemoryRuntime::new();
        rt.insert("web_api", "img:1", true);
        let links = probe(&rt, "web", &[service("api")]).await.unwrap();
        assert_eq!(links[0].status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn probe_is_read_only() {
        let rt = MemoryRuntime::new();
        rt.insert("web_api", "img:1", false);
        probe(&rt, "web", &[service("api"), service("db")]).await.unwrap();
        assert!(rt.mutations().is_empty());
    }

    #[tokio::test]
    async fn runtime_failure_propagates() {
        let rt = MemoryRuntime::new();
        rt.fail_on(RuntimeOp::List, "web_db");

        let err = probe(&rt, "web", &[service("api"), service("db")]).await.unwrap_err();
        match err {
            ReconcileError::Probe { service, .. } => assert_eq!(service, "db"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_labels() {
        assert_eq!(ContainerStatus::NotCreated.to_string(), "not created");
        assert_eq!(ContainerStatus::NotRunning.to_string(), "not running");
        assert_eq!(ContainerStatus::Running.to_string(), "running");
    }
}
