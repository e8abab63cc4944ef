//! Pattern registry and naming service.
//!
//! Recognizes operation names that are references into the shared versioned
//! name registry (`${queryNames.byIdV1}`) rather than literals, and carries
//! the version/deprecation metadata needed for migration advisories.
//!
//! The registry is an explicitly constructed object built from validated
//! configuration and passed through the pipeline context; there is no
//! process-global instance.

pub mod migration;

pub use migration::{
    ChangeTypeBreakdown, MigrationAdvisor, MigrationKind, MigrationRecommendation,
    MigrationReport, MigrationResult, MigrationSummary, NameTableDiffEntry,
};

use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{
    GlobalReplacement, MigrationManifestEntry, PatternEntryConfig, RegistryConfig,
};

/// A dynamic operation name resolved through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamePattern {
    /// The name as written in source, e.g. `${queryNames.byIdV1}`.
    pub template: String,
    /// Registry property the template references, e.g. `byIdV1`.
    pub property: String,
    /// The literal name this pattern resolves to for its version.
    pub resolved_name: String,
    /// Every literal name the pattern family can resolve to, oldest first.
    pub possible_values: Vec<String>,
    /// Logical family id.
    pub pattern_key: String,
    pub version: String,
    pub is_deprecated: bool,
    /// Latest non-deprecated version to move to. Only set when deprecated;
    /// falls back to the last listed version when every version is deprecated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_path: Option<String>,
}

/// Versioned dynamic-name registry, validated at construction.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    registry_object: String,
    properties: HashMap<String, crate::config::PropertyBinding>,
    patterns: HashMap<String, PatternEntryConfig>,
    migrations: HashMap<String, MigrationManifestEntry>,
    replacements: Vec<GlobalReplacement>,
    pattern_re: Regex,
}

impl PatternRegistry {
    /// Build and structurally validate the registry.
    ///
    /// This is the one configuration precondition that can fail a run before
    /// any file is processed.
    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        for (property, binding) in &config.properties {
            let entry = config.patterns.get(&binding.pattern_key).ok_or_else(|| {
                anyhow!(
                    "registry property '{}' references unknown pattern '{}'",
                    property,
                    binding.pattern_key
                )
            })?;
            if !entry.versions.contains(&binding.version) {
                bail!(
                    "registry property '{}' uses version '{}' not listed for pattern '{}'",
                    property,
                    binding.version,
                    binding.pattern_key
                );
            }
        }

        for (key, manifest) in &config.migrations {
            let prefix = format!("{}.", config.registry_object);
            if !key.starts_with(&prefix) {
                bail!(
                    "migration manifest key '{}' must be qualified with '{}'",
                    key,
                    prefix
                );
            }
            if let Some(target) = &manifest.target_property {
                if !config.properties.contains_key(target) {
                    bail!(
                        "migration manifest '{}' targets unknown property '{}'",
                        key,
                        target
                    );
                }
            }
        }

        let pattern_re = Regex::new(&format!(
            r"(query|mutation|subscription)\s+\$\{{\s*{}\.([A-Za-z_][A-Za-z0-9_]*)\s*\}}",
            regex::escape(&config.registry_object)
        ))
        .expect("valid registry regex");

        Ok(Self {
            registry_object: config.registry_object,
            properties: config.properties,
            patterns: config.patterns,
            migrations: config.migrations,
            replacements: config.replacements,
            pattern_re,
        })
    }

    pub fn registry_object(&self) -> &str {
        &self.registry_object
    }

    pub fn replacements(&self) -> &[GlobalReplacement] {
        &self.replacements
    }

    pub fn manifest_entry(&self, property: &str) -> Option<&MigrationManifestEntry> {
        self.migrations
            .get(&format!("{}.{}", self.registry_object, property))
    }

    pub fn entry(&self, pattern_key: &str) -> Option<&PatternEntryConfig> {
        self.patterns.get(pattern_key)
    }

    /// Find the property of `pattern_key` bound to `version`.
    pub fn property_for_version(&self, pattern_key: &str, version: &str) -> Option<String> {
        self.properties
            .iter()
            .find(|(_, binding)| binding.pattern_key == pattern_key && binding.version == version)
            .map(|(property, _)| property.clone())
    }

    /// Detect a registry reference in operation-name position.
    ///
    /// An unrecognized property is "not a pattern query", never an error.
    pub fn detect_pattern(&self, raw_content: &str) -> Option<NamePattern> {
        let caps = self.pattern_re.captures(raw_content)?;
        self.pattern_for_property(&caps[2])
    }

    /// Build the `NamePattern` for a known registry property.
    pub fn pattern_for_property(&self, property: &str) -> Option<NamePattern> {
        let binding = self.properties.get(property)?;
        let entry = self.patterns.get(&binding.pattern_key)?;

        let resolved_name = entry
            .names
            .get(&binding.version)
            .cloned()
            .unwrap_or_else(|| property.to_string());
        let possible_values = entry
            .versions
            .iter()
            .filter_map(|version| entry.names.get(version).cloned())
            .collect();
        let is_deprecated = entry.deprecations.contains_key(&binding.version);
        let migration_path = if is_deprecated {
            Some(migration_path(entry))
        } else {
            None
        };

        Some(NamePattern {
            template: format!("${{{}.{}}}", self.registry_object, property),
            property: property.to_string(),
            resolved_name,
            possible_values,
            pattern_key: binding.pattern_key.clone(),
            version: binding.version.clone(),
            is_deprecated,
            migration_path,
        })
    }
}

/// Latest non-deprecated version of an entry; the last listed version when
/// every version is deprecated.
fn migration_path(entry: &PatternEntryConfig) -> String {
    entry
        .versions
        .iter()
        .rev()
        .find(|version| !entry.deprecations.contains_key(*version))
        .or_else(|| entry.versions.last())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::PropertyBinding;

    pub(crate) fn test_registry() -> PatternRegistry {
        let mut config = RegistryConfig::default();
        config.properties.insert(
            "byIdV1".to_string(),
            PropertyBinding {
                pattern_key: "getById".to_string(),
                version: "V1".to_string(),
            },
        );
        config.properties.insert(
            "byIdV3".to_string(),
            PropertyBinding {
                pattern_key: "getById".to_string(),
                version: "V3".to_string(),
            },
        );
        config.patterns.insert(
            "getById".to_string(),
            PatternEntryConfig {
                versions: vec!["V1".to_string(), "V2".to_string(), "V3".to_string()],
                names: [
                    ("V1".to_string(), "getVentureByIdV1".to_string()),
                    ("V2".to_string(), "getVentureByIdV2".to_string()),
                    ("V3".to_string(), "getVentureByIdV3".to_string()),
                ]
                .into_iter()
                .collect(),
                deprecations: [
                    ("V1".to_string(), "superseded by V3".to_string()),
                    ("V2".to_string(), "superseded by V3".to_string()),
                ]
                .into_iter()
                .collect(),
                fragments: [
                    ("V1".to_string(), "ventureFields".to_string()),
                    ("V3".to_string(), "ventureInfinityStoneFields".to_string()),
                ]
                .into_iter()
                .collect(),
                conditions: HashMap::new(),
            },
        );
        PatternRegistry::from_config(config).unwrap()
    }

    #[test]
    fn test_detect_pattern_query() {
        let registry = test_registry();
        let pattern = registry
            .detect_pattern("query ${queryNames.byIdV1} { venture { id } }")
            .unwrap();
        assert_eq!(pattern.property, "byIdV1");
        assert_eq!(pattern.resolved_name, "getVentureByIdV1");
        assert_eq!(pattern.pattern_key, "getById");
        assert_eq!(pattern.version, "V1");
        assert!(pattern.is_deprecated);
        assert_eq!(pattern.migration_path.as_deref(), Some("V3"));
        assert_eq!(
            pattern.possible_values,
            vec!["getVentureByIdV1", "getVentureByIdV2", "getVentureByIdV3"]
        );
    }

    #[test]
    fn test_latest_version_not_deprecated() {
        let registry = test_registry();
        let pattern = registry.pattern_for_property("byIdV3").unwrap();
        assert!(!pattern.is_deprecated);
        assert_eq!(pattern.migration_path, None);
    }

    #[test]
    fn test_unknown_property_is_not_a_pattern() {
        let registry = test_registry();
        assert!(
            registry
                .detect_pattern("query ${queryNames.unknownThing} { a }")
                .is_none()
        );
    }

    #[test]
    fn test_static_name_is_not_a_pattern() {
        let registry = test_registry();
        assert!(
            registry
                .detect_pattern("query getVentureStatic { venture { id } }")
                .is_none()
        );
    }

    #[test]
    fn test_all_versions_deprecated_falls_back_to_last() {
        let mut config = RegistryConfig::default();
        config.properties.insert(
            "oldV1".to_string(),
            PropertyBinding {
                pattern_key: "old".to_string(),
                version: "V1".to_string(),
            },
        );
        config.patterns.insert(
            "old".to_string(),
            PatternEntryConfig {
                versions: vec!["V1".to_string(), "V2".to_string()],
                names: [
                    ("V1".to_string(), "oldV1".to_string()),
                    ("V2".to_string(), "oldV2".to_string()),
                ]
                .into_iter()
                .collect(),
                deprecations: [
                    ("V1".to_string(), "gone".to_string()),
                    ("V2".to_string(), "gone".to_string()),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            },
        );
        let registry = PatternRegistry::from_config(config).unwrap();
        let pattern = registry.pattern_for_property("oldV1").unwrap();
        assert_eq!(pattern.migration_path.as_deref(), Some("V2"));
    }

    #[test]
    fn test_invalid_registry_fails_construction() {
        let mut config = RegistryConfig::default();
        config.properties.insert(
            "byIdV1".to_string(),
            PropertyBinding {
                pattern_key: "missingPattern".to_string(),
                version: "V1".to_string(),
            },
        );
        assert!(PatternRegistry::from_config(config).is_err());
    }

    #[test]
    fn test_unqualified_manifest_key_fails() {
        let mut config = RegistryConfig::default();
        config
            .migrations
            .insert("byIdV1".to_string(), MigrationManifestEntry::default());
        assert!(PatternRegistry::from_config(config).is_err());
    }

    #[test]
    fn test_property_for_version() {
        let registry = test_registry();
        assert_eq!(
            registry.property_for_version("getById", "V3").as_deref(),
            Some("byIdV3")
        );
        assert_eq!(registry.property_for_version("getById", "V9"), None);
    }
}
