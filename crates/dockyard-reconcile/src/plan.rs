//! Action planning.
//!
//! Pure functions from probe results to an ordered list of runtime actions.
//! Planning never talks to the runtime; the executor applies the plan.

use std::fmt;

use serde::Serialize;

use crate::probe::{ContainerStatus, ServiceContainerLink, container_name};

/// One step the executor performs against the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// The service is already in the requested state.
    Noop { service: String },
    CreateAndStart {
        service: String,
        container_name: String,
        image: String,
    },
    Start { service: String, container_id: String },
    Stop { service: String, container_id: String },
    Remove { service: String, container_id: String },
}

/// Discriminant of [`Action`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Noop,
    CreateAndStart,
    Start,
    Stop,
    Remove,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Noop => "noop",
            ActionKind::CreateAndStart => "create-and-start",
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Remove => "remove",
        })
    }
}

impl Action {
    pub fn service(&self) -> &str {
        match self {
            Action::Noop { service }
            | Action::CreateAndStart { service, .. }
            | Action::Start { service, .. }
            | Action::Stop { service, .. }
            | Action::Remove { service, .. } => service,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Noop { .. } => ActionKind::Noop,
            Action::CreateAndStart { .. } => ActionKind::CreateAndStart,
            Action::Start { .. } => ActionKind::Start,
            Action::Stop { .. } => ActionKind::Stop,
            Action::Remove { .. } => ActionKind::Remove,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Noop { .. })
    }
}

/// Ordered actions for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// True when executing the plan would not touch the runtime.
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(Action::is_noop)
    }

    /// Number of actions that mutate the runtime.
    pub fn changed(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_noop()).count()
    }

    pub fn extend(&mut self, other: Plan) {
        self.actions.extend(other.actions);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }
}

impl IntoIterator for Plan {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

/// Bring every service to running. One action per service, in link order.
pub fn start_plan(app_name: &str, links: &[ServiceContainerLink]) -> Plan {
    let actions = links
        .iter()
        .map(|link| {
            let service = link.service.name.clone();
            match (link.status, &link.container) {
                (ContainerStatus::NotCreated, _) | (_, None) => Action::CreateAndStart {
                    container_name: container_name(app_name, &service),
                    image: link.service.image.clone(),
                    service,
                },
                (ContainerStatus::NotRunning, Some(c)) => Action::Start {
                    service,
                    container_id: c.id.clone(),
                },
                (ContainerStatus::Running, Some(_)) => Action::Noop { service },
            }
        })
        .collect();
    Plan::new(actions)
}

/// Stop running services. Containers are kept; nothing is ever removed.
pub fn stop_plan(links: &[ServiceContainerLink]) -> Plan {
    let actions = links
        .iter()
        .map(|link| {
            let service = link.service.name.clone();
            match (link.status, &link.container) {
                (ContainerStatus::Running, Some(c)) => Action::Stop {
                    service,
                    container_id: c.id.clone(),
                },
                _ => Action::Noop { service },
            }
        })
        .collect();
    Plan::new(actions)
}

/// Stop (if running) and remove each service's container.
pub fn teardown_plan(links: &[ServiceContainerLink]) -> Plan {
    let mut actions = Vec::new();
    for link in links {
        let service = link.service.name.clone();
        let Some(container) = &link.container else {
            actions.push(Action::Noop { service });
            continue;
        };
        if link.status == ContainerStatus::Running {
            actions.push(Action::Stop {
                service: service.clone(),
                container_id: container.id.clone(),
            });
        }
        actions.push(Action::Remove {
            service,
            container_id: container.id.clone(),
        });
    }
    Plan::new(actions)
}
