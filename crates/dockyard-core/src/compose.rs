//! Compose-format definition parser.
//!
//! Turns a raw YAML payload into an [`ApplicationDefinition`]. Only the
//! parts Dockyard acts on are typed (`image`, `volumes`); every other
//! service key is carried as an opaque JSON value so it still takes part in
//! change detection.
//!
//! The project name is a required attribute. It comes from the caller when
//! one is known (updates reuse the stored name), otherwise from the
//! payload's `project_name` key, falling back to the compose `name` key.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{DefinitionError, DefinitionResult};
use crate::types::{ApplicationDefinition, ServiceSpec, VolumeMount};

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    /// Obsolete top-level key; accepted and ignored.
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    services: Option<BTreeMap<String, ComposeService>>,
    #[serde(flatten)]
    resources: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    volumes: Vec<ComposeVolume>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComposeVolume {
    Short(String),
    Long(LongVolume),
}

#[derive(Debug, Deserialize)]
struct LongVolume {
    #[serde(default)]
    source: Option<String>,
    target: String,
    #[serde(default)]
    read_only: bool,
}

/// Parse a compose payload into an application definition.
///
/// `name` overrides any name declared in the payload. Pass `None` (or an
/// empty string) to require the payload to carry its own project name.
pub fn parse_definition(raw: &str, name: Option<&str>) -> DefinitionResult<ApplicationDefinition> {
    if raw.trim().is_empty() {
        return Err(DefinitionError::Validation("empty definition payload".into()));
    }

    let file: ComposeFile =
        serde_yaml::from_str(raw).map_err(|e| DefinitionError::Parse(e.to_string()))?;

    let project_name = match name.filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => file
            .project_name
            .or(file.name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DefinitionError::Parse("no project name provided".into()))?,
    };

    let services = file
        .services
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DefinitionError::Parse("definition declares no services".into()))?;

    let services = services
        .into_iter()
        .map(|(service_name, svc)| convert_service(service_name, svc))
        .collect::<DefinitionResult<Vec<_>>>()?;

    let resources = file
        .resources
        .into_iter()
        .map(|(k, v)| Ok((k, to_json(&v)?)))
        .collect::<DefinitionResult<BTreeMap<_, _>>>()?;

    ApplicationDefinition::new(&project_name, raw, services, resources)
}

fn convert_service(name: String, svc: ComposeService) -> DefinitionResult<ServiceSpec> {
    if name.trim().is_empty() {
        return Err(DefinitionError::Parse("service with empty name".into()));
    }
    let image = svc
        .image
        .filter(|i| !i.is_empty())
        .ok_or_else(|| DefinitionError::Parse(format!("service '{name}' has no image")))?;

    let volumes = svc
        .volumes
        .into_iter()
        .map(|v| convert_volume(&name, v))
        .collect::<DefinitionResult<Vec<_>>>()?;

    let attributes = svc
        .rest
        .into_iter()
        .map(|(k, v)| Ok((k, to_json(&v)?)))
        .collect::<DefinitionResult<BTreeMap<_, _>>>()?;

    Ok(ServiceSpec {
        name,
        image,
        volumes,
        attributes,
    })
}

fn convert_volume(service: &str, volume: ComposeVolume) -> DefinitionResult<VolumeMount> {
    match volume {
        ComposeVolume::Long(long) => Ok(VolumeMount {
            source: long.source.unwrap_or_default(),
            target: long.target,
            read_only: long.read_only,
        }),
        ComposeVolume::Short(spec) => parse_short_volume(&spec).ok_or_else(|| {
            DefinitionError::Parse(format!("service '{service}': invalid volume '{spec}'"))
        }),
    }
}

/// `target`, `source:target` or `source:target:mode`.
fn parse_short_volume(spec: &str) -> Option<VolumeMount> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [target] => ("", *target, None),
        [source, target] => (*source, *target, None),
        [source, target, mode] => (*source, *target, Some(*mode)),
        _ => return None,
    };
    if target.is_empty() {
        return None;
    }
    let read_only = match mode {
        None => false,
        Some(m) => m.split(',').any(|flag| flag == "ro"),
    };
    Some(VolumeMount {
        source: source.to_string(),
        target: target.to_string(),
        read_only,
    })
}

fn to_json(value: &serde_yaml::Value) -> DefinitionResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| DefinitionError::Parse(e.to_string()))
}
