//! Definition diffing.
//!
//! Compares two generations of an application by fingerprint. The result is
//! informational: update always replaces every service, the diff only says
//! what changed.

use std::collections::BTreeMap;

use serde::Serialize;

use dockyard_core::{ApplicationDefinition, DefinitionResult, Fingerprint};

/// A service whose content survived under a new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
    pub fingerprint: Fingerprint,
}

/// A service present in both generations with different content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modification {
    pub service: String,
    pub old: Fingerprint,
    pub new: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionDiff {
    pub old_fingerprint: Fingerprint,
    pub new_fingerprint: Fingerprint,
    pub renamed: Vec<Rename>,
    pub modified: Vec<Modification>,
    /// New services, excluding rename targets.
    pub added: Vec<String>,
    /// Dropped services, excluding rename sources.
    pub removed: Vec<String>,
}

impl DefinitionDiff {
    /// Whether the whole-definition fingerprints differ.
    pub fn changed(&self) -> bool {
        self.old_fingerprint != self.new_fingerprint
    }
}

/// Diff two generations of a definition.
///
/// A service counts as renamed when an old service and a new service share
/// a fingerprint, the old name is absent from the new generation, and the new
/// name is absent from the old one. Each service takes part in at most one
/// rename.
pub fn diff_definitions(
    old: &ApplicationDefinition,
    new: &ApplicationDefinition,
) -> DefinitionResult<DefinitionDiff> {
    let old_services: BTreeMap<String, Fingerprint> =
        old.service_fingerprints()?.into_iter().collect();
    let new_services: BTreeMap<String, Fingerprint> =
        new.service_fingerprints()?.into_iter().collect();

    let mut modified = Vec::new();
    for (name, old_fp) in &old_services {
        if let Some(new_fp) = new_services.get(name) {
            if new_fp != old_fp {
                modified.push(Modification {
                    service: name.clone(),
                    old: old_fp.clone(),
                    new: new_fp.clone(),
                });
            }
        }
    }

    let mut gone: Vec<(&String, &Fingerprint)> = old_services
        .iter()
        .filter(|(name, _)| !new_services.contains_key(*name))
        .collect();
    let appeared: Vec<(&String, &Fingerprint)> = new_services
        .iter()
        .filter(|(name, _)| !old_services.contains_key(*name))
        .collect();

    let mut renamed = Vec::new();
    let mut added = Vec::new();
    for (name, fp) in appeared {
        match gone.iter().position(|(_, old_fp)| *old_fp == fp) {
            Some(idx) => {
                let (from, _) = gone.remove(idx);
                renamed.push(Rename {
                    from: from.clone(),
                    to: name.clone(),
                    fingerprint: fp.clone(),
                });
            }
            None => added.push(name.clone()),
        }
    }
    let removed = gone.into_iter().map(|(name, _)| name.clone()).collect();

    Ok(DefinitionDiff {
        old_fingerprint: old.fingerprint.clone(),
        new_fingerprint: new.fingerprint.clone(),
        renamed,
        modified,
        added,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_core::parse_definition;

    fn def(yaml: &str) -> ApplicationDefinition {
        parse_definition(yaml, Some("web")).unwrap()
    }

    #[test]
    fn identical_definitions_have_empty_diff() {
        let a = def("services:\n  api:\n    image: img:1\n");
        let diff = diff_definitions(&a, &a.clone()).unwrap();
        assert!(!diff.changed());
        assert!(diff.renamed.is_empty() && diff.modified.is_empty());
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn image_change_is_a_modification() {
        let a = def("services:\n  api:\n    image: img:1\n");
        let b = def("services:\n  api:\n    image: img:2\n");
        let diff = diff_definitions(&a, &b).unwrap();
        assert!(diff.changed());
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].service, "api");
    }

    #[test]
    fn identical_content_under_new_name_is_a_rename() {
        let a = def("services:\n  api:\n    image: img:1\n  db:\n    image: pg:16\n");
        let b = def("services:\n  backend:\n    image: img:1\n  db:\n    image: pg:16\n");
        let diff = diff_definitions(&a, &b).unwrap();
        assert_eq!(diff.renamed.len(), 1);
        assert_eq!(diff.renamed[0].from, "api");
        assert_eq!(diff.renamed[0].to, "backend");
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn surviving_name_is_never_a_rename_source() {
        // `api` still exists, so the copy in `api2` is an addition.
        let a = def("services:\n  api:\n    image: img:1\n");
        let b = def("services:\n  api:\n    image: img:1\n  api2:\n    image: img:1\n");
        let diff = diff_definitions(&a, &b).unwrap();
        assert!(diff.renamed.is_empty());
        assert_eq!(diff.added, vec!["api2".to_string()]);
    }

    #[test]
    fn added_and_removed() {
        let a = def("services:\n  api:\n    image: img:1\n");
        let b = def("services:\n  worker:\n    image: img:9\n");
        let diff = diff_definitions(&a, &b).unwrap();
        assert_eq!(diff.added, vec!["worker".to_string()]);
        assert_eq!(diff.removed, vec!["api".to_string()]);
    }
}
