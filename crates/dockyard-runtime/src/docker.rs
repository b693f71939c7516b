//! Docker backend built on bollard.

use std::collections::{BTreeMap, HashMap};

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::ContainerSummary;
use bollard::{API_DEFAULT_VERSION, Docker};
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{ContainerRecord, ContainerRuntime, RuntimeFuture};

/// Container runtime backed by a Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to Docker.
    ///
    /// `host` accepts `unix://<path>` or `tcp://`/`http://` addresses. `None`
    /// uses `DOCKER_HOST` or the platform's default socket.
    pub fn connect(host: Option<&str>, timeout_secs: u64) -> RuntimeResult<Self> {
        let docker = match host {
            None => Docker::connect_with_local_defaults()
                .map(|d| d.with_timeout(std::time::Duration::from_secs(timeout_secs))),
            Some(h) if h.starts_with("unix://") => {
                Docker::connect_with_unix(h, timeout_secs, API_DEFAULT_VERSION)
            }
            Some(h) => Docker::connect_with_http(h, timeout_secs, API_DEFAULT_VERSION),
        }
        .map_err(transport)?;
        debug!(host = host.unwrap_or("local defaults"), "docker client configured");
        Ok(Self { docker })
    }

    /// Wrap an already configured client.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

impl ContainerRuntime for DockerRuntime {
    fn list<'a>(
        &'a self,
        name_filter: &'a str,
        include_stopped: bool,
    ) -> RuntimeFuture<'a, Vec<ContainerRecord>> {
        Box::pin(async move {
            let mut filters = HashMap::new();
            filters.insert("name".to_string(), vec![name_filter.to_string()]);
            let options = ListContainersOptions {
                all: include_stopped,
                filters,
                ..Default::default()
            };
            let summaries = self
                .docker
                .list_containers(Some(options))
                .await
                .map_err(|e| classify(e, name_filter))?;
            Ok(summaries.into_iter().filter_map(to_record).collect())
        })
    }

    fn create<'a>(
        &'a self,
        name: &'a str,
        image: &'a str,
        labels: &'a BTreeMap<String, String>,
    ) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            let options = CreateContainerOptions {
                name: name.to_string(),
                ..Default::default()
            };
            let config = Config {
                image: Some(image.to_string()),
                labels: Some(labels.clone().into_iter().collect::<HashMap<_, _>>()),
                ..Default::default()
            };
            let response = self
                .docker
                .create_container(Some(options), config)
                .await
                .map_err(|e| classify(e, name))?;
            debug!(container = %name, id = %response.id, "docker container created");
            Ok(response.id)
        })
    }

    fn start<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            match self
                .docker
                .start_container(container_id, None::<StartContainerOptions<String>>)
                .await
            {
                Ok(()) => Ok(()),
                // 304: already started.
                Err(e) if status_code(&e) == Some(304) => Ok(()),
                Err(e) => Err(classify(e, container_id)),
            }
        })
    }

    fn stop<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            match self
                .docker
                .stop_container(container_id, None::<StopContainerOptions>)
                .await
            {
                Ok(()) => Ok(()),
                // 304: already stopped.
                Err(e) if status_code(&e) == Some(304) => Ok(()),
                Err(e) => Err(classify(e, container_id)),
            }
        })
    }

    fn remove<'a>(&'a self, container_id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.docker
                .remove_container(container_id, None::<RemoveContainerOptions>)
                .await
                .map_err(|e| classify(e, container_id))
        })
    }
}

fn to_record(summary: ContainerSummary) -> Option<ContainerRecord> {
    let id = summary.id?;
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    Some(ContainerRecord {
        id,
        name,
        state: summary.state.unwrap_or_default(),
        image: summary.image,
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
    })
}

fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn classify(err: BollardError, subject: &str) -> RuntimeError {
    match status_code(&err) {
        Some(404) => RuntimeError::NotFound(subject.to_string()),
        Some(409) => RuntimeError::Conflict(format!("{subject}: {err}")),
        _ => transport(err),
    }
}

fn transport(err: BollardError) -> RuntimeError {
    RuntimeError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: Option<&str>, name: &str, state: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.map(str::to_string),
            names: Some(vec![format!("/{name}")]),
            state: Some(state.to_string()),
            image: Some("img:1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn record_strips_leading_slash() {
        let record = to_record(summary(Some("abc"), "web_api", "running")).unwrap();
        assert_eq!(record.name, "web_api");
        assert_eq!(record.id, "abc");
        assert!(record.is_running());
    }

    #[test]
    fn summary_without_id_is_skipped() {
        assert!(to_record(summary(None, "web_api", "running")).is_none());
    }

    #[test]
    fn exited_is_not_running() {
        let record = to_record(summary(Some("abc"), "web_api", "exited")).unwrap();
        assert!(!record.is_running());
    }

    #[test]
    fn server_errors_are_classified() {
        let not_found = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container".into(),
        };
        assert_eq!(classify(not_found, "abc"), RuntimeError::NotFound("abc".into()));

        let conflict = BollardError::DockerResponseServerError {
            status_code: 409,
            message: "name in use".into(),
        };
        assert!(matches!(classify(conflict, "web_api"), RuntimeError::Conflict(_)));

        let boom = BollardError::DockerResponseServerError {
            status_code: 500,
            message: "boom".into(),
        };
        assert!(matches!(classify(boom, "abc"), RuntimeError::Transport(_)));
    }
}
