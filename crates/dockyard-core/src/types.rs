//! Desired-state types shared across Dockyard crates.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, DefinitionResult};
use crate::fingerprint::{Fingerprint, fingerprint};

/// Application names are joined with service names to form container names,
/// so they are restricted to a conservative alphabet.
const APP_NAME_PATTERN: &str = r"^[A-Za-z0-9_]+$";
const APP_NAME_MIN_LEN: usize = 2;
const APP_NAME_MAX_LEN: usize = 50;
/// Docker's container-name alphabet; service names end up inside one.
const SERVICE_NAME_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

/// One mount declared by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Host path or named volume. Empty for anonymous volumes.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.target)
    }
}

/// One independently lifecycled service of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Image reference handed to the runtime on create.
    pub image: String,
    pub volumes: Vec<VolumeMount>,
    /// Every other declarative key, passed through untouched.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// The part of a service that defines what runs, independent of its name.
#[derive(Serialize)]
struct ServiceContent<'a> {
    image: &'a str,
    volumes: &'a [VolumeMount],
    attributes: &'a BTreeMap<String, serde_json::Value>,
}

impl ServiceSpec {
    /// Fingerprint of the service content.
    ///
    /// The service name is excluded so a renamed but otherwise identical
    /// service keeps its fingerprint across generations.
    pub fn fingerprint(&self) -> DefinitionResult<Fingerprint> {
        Ok(fingerprint(&ServiceContent {
            image: &self.image,
            volumes: &self.volumes,
            attributes: &self.attributes,
        })?)
    }
}

/// Canonical form hashed for the whole-definition fingerprint.
#[derive(Serialize)]
struct ProjectContent<'a> {
    name: &'a str,
    services: &'a [ServiceSpec],
    resources: &'a BTreeMap<String, serde_json::Value>,
}

/// Desired state of one application: one generation of its definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    pub name: String,
    /// The payload exactly as submitted.
    pub raw: String,
    /// Services ordered by name.
    pub services: Vec<ServiceSpec>,
    /// Top-level non-service sections (networks, volumes, ...).
    #[serde(default)]
    pub resources: BTreeMap<String, serde_json::Value>,
    /// Computed over the parsed representation, never over `raw`.
    pub fingerprint: Fingerprint,
}

impl ApplicationDefinition {
    /// Assemble a definition, computing its fingerprint and validating it.
    pub fn new(
        name: &str,
        raw: &str,
        mut services: Vec<ServiceSpec>,
        resources: BTreeMap<String, serde_json::Value>,
    ) -> DefinitionResult<Self> {
        services.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = services.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(DefinitionError::Parse(format!(
                "duplicate service name '{}'",
                pair[0].name
            )));
        }

        let fingerprint = fingerprint(&ProjectContent {
            name,
            services: &services,
            resources: &resources,
        })?;

        let definition = Self {
            name: name.to_string(),
            raw: raw.to_string(),
            services,
            resources,
            fingerprint,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Reject definitions that must never reach the store or the runtime.
    pub fn validate(&self) -> DefinitionResult<()> {
        validate_app_name(&self.name)?;
        for service in &self.services {
            validate_service_name(&service.name)?;
        }
        if self.raw.trim().is_empty() {
            return Err(DefinitionError::Validation("empty definition payload".into()));
        }
        if self.fingerprint.is_empty() {
            return Err(DefinitionError::Validation("empty fingerprint".into()));
        }
        Ok(())
    }

    /// Per-service fingerprints, in service order.
    pub fn service_fingerprints(&self) -> DefinitionResult<Vec<(String, Fingerprint)>> {
        self.services
            .iter()
            .map(|s| Ok((s.name.clone(), s.fingerprint()?)))
            .collect()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Check an application name: 2–50 characters of `[A-Za-z0-9_]`.
pub fn validate_app_name(name: &str) -> DefinitionResult<()> {
    if name.is_empty() {
        return Err(DefinitionError::Validation("application name is required".into()));
    }
    let len = name.chars().count();
    if !(APP_NAME_MIN_LEN..=APP_NAME_MAX_LEN).contains(&len) {
        return Err(DefinitionError::Validation(format!(
            "application name must be {APP_NAME_MIN_LEN}-{APP_NAME_MAX_LEN} characters, got {len}"
        )));
    }
    let re = Regex::new(APP_NAME_PATTERN).map_err(|e| DefinitionError::Validation(e.to_string()))?;
    if !re.is_match(name) {
        return Err(DefinitionError::Validation(format!(
            "application name '{name}' may only contain letters, digits and underscores"
        )));
    }
    Ok(())
}

/// Check a service name against `[A-Za-z0-9_.-]`.
pub fn validate_service_name(name: &str) -> DefinitionResult<()> {
    let re =
        Regex::new(SERVICE_NAME_PATTERN).map_err(|e| DefinitionError::Validation(e.to_string()))?;
    if !re.is_match(name) {
        return Err(DefinitionError::Validation(format!(
            "service name '{name}' may only contain letters, digits, '_', '.' and '-'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, image: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            image: image.to_string(),
            volumes: vec![],
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn app_name_rules() {
        assert!(validate_app_name("web").is_ok());
        assert!(validate_app_name("app_test_influx").is_ok());
        assert!(validate_app_name("A1").is_ok());

        assert!(validate_app_name("").is_err());
        assert!(validate_app_name("a").is_err());
        assert!(validate_app_name(&"a".repeat(51)).is_err());
        assert!(validate_app_name("my-app").is_err());
        assert!(validate_app_name("my app").is_err());
    }

    #[test]
    fn service_name_rules() {
        assert!(validate_service_name("api").is_ok());
        assert!(validate_service_name("api-v2.internal_1").is_ok());

        assert!(validate_service_name("my svc").is_err());
        assert!(validate_service_name("a/b").is_err());
        assert!(validate_service_name("").is_err());

        let err = ApplicationDefinition::new("web", "x", vec![service("a/b", "a:1")], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, DefinitionError::Validation(_)));
    }

    #[test]
    fn services_are_sorted_by_name() {
        let def = ApplicationDefinition::new(
            "web",
            "services: {}",
            vec![service("worker", "w:1"), service("api", "a:1")],
            BTreeMap::new(),
        )
        .unwrap();
        let names: Vec<_> = def.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["api", "worker"]);
    }

    #[test]
    fn duplicate_service_names_rejected() {
        let err = ApplicationDefinition::new(
            "web",
            "x",
            vec![service("api", "a:1"), service("api", "a:2")],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::Parse(_)));
    }

    #[test]
    fn empty_payload_rejected() {
        let err = ApplicationDefinition::new("web", "  ", vec![service("api", "a:1")], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, DefinitionError::Validation(_)));
    }

    #[test]
    fn service_fingerprint_ignores_name() {
        let a = service("api", "img:1").fingerprint().unwrap();
        let b = service("backend", "img:1").fingerprint().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn image_change_moves_both_fingerprints() {
        let v1 = ApplicationDefinition::new("web", "x", vec![service("api", "img:1")], BTreeMap::new())
            .unwrap();
        let v2 = ApplicationDefinition::new("web", "x", vec![service("api", "img:2")], BTreeMap::new())
            .unwrap();

        assert_ne!(v1.fingerprint, v2.fingerprint);
        assert_ne!(
            v1.services[0].fingerprint().unwrap(),
            v2.services[0].fingerprint().unwrap()
        );
    }

    #[test]
    fn raw_text_does_not_affect_fingerprint() {
        let v1 = ApplicationDefinition::new("web", "one", vec![service("api", "img:1")], BTreeMap::new())
            .unwrap();
        let v2 = ApplicationDefinition::new("web", "two", vec![service("api", "img:1")], BTreeMap::new())
            .unwrap();
        assert_eq!(v1.fingerprint, v2.fingerprint);
    }

    #[test]
    fn volume_display() {
        let v = VolumeMount {
            source: "./data".into(),
            target: "/var/lib/data".into(),
            read_only: false,
        };
        assert_eq!(v.to_string(), "./data:/var/lib/data");
    }
}
