//! Migration advisories for deprecated pattern queries and static rewrites.
//!
//! Dynamic (pattern) queries are never rewritten: only the recommendation
//! metadata is produced, preserving run-time behavior. Fully static queries
//! may have literal-text replacements applied verbatim.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{FragmentChange, GlobalReplacement};
use crate::core::naming::{NamePattern, PatternRegistry};
use crate::core::resolve::ResolvedQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    /// Name is a registry pattern; advisory only.
    Pattern,
    /// Static query with literal replacements applied.
    Static,
    /// Nothing to do.
    Current,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecommendation {
    pub should_migrate: bool,
    /// Registry property to migrate to (e.g. `byIdV3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_pattern: Option<String>,
    /// Literal operation name of the target version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub fragment_changes: Vec<FragmentChange>,
    /// Set when a human should look: a fragment change is involved, or the
    /// transition skips more than one version.
    pub requires_manual_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub query_id: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub kind: MigrationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<MigrationRecommendation>,
    pub applied_replacements: Vec<GlobalReplacement>,
    /// Rewritten text for static migrations only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTypeBreakdown {
    pub name: usize,
    pub fragment: usize,
    pub directive: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total: usize,
    pub needs_migration: usize,
    pub requires_manual_review: usize,
    pub pattern_migrations: usize,
    pub static_migrations: usize,
    /// `"V1 → V3"` -> count.
    pub version_transitions: BTreeMap<String, usize>,
    pub change_types: ChangeTypeBreakdown,
}

/// One row of the proposed name-table diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameTableDiffEntry {
    pub pattern_key: String,
    pub property: String,
    pub current_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub results: Vec<MigrationResult>,
    pub summary: MigrationSummary,
    pub name_table_diff: Vec<NameTableDiffEntry>,
}

pub struct MigrationAdvisor<'a> {
    registry: &'a PatternRegistry,
}

impl<'a> MigrationAdvisor<'a> {
    pub fn new(registry: &'a PatternRegistry) -> Self {
        Self { registry }
    }

    /// Advise on every query and aggregate the batch summary and name-table
    /// diff.
    pub fn advise(&self, queries: &[ResolvedQuery]) -> MigrationReport {
        let results: Vec<MigrationResult> =
            queries.iter().map(|query| self.advise_query(query)).collect();
        let summary = summarize(&results);
        let name_table_diff = name_table_diff(&results);
        MigrationReport {
            results,
            summary,
            name_table_diff,
        }
    }

    pub fn advise_query(&self, query: &ResolvedQuery) -> MigrationResult {
        if let Some(pattern) = &query.query.metadata.pattern {
            return MigrationResult {
                query_id: query.query.id.clone(),
                file_path: query.query.file_path.clone(),
                operation_name: Some(pattern.resolved_name.clone()),
                kind: MigrationKind::Pattern,
                recommendation: Some(self.recommend(pattern)),
                applied_replacements: Vec::new(),
                rewritten_content: None,
            };
        }

        // Static query: apply global literal replacements verbatim.
        let mut content = query.resolved_content.clone();
        let mut applied = Vec::new();
        for replacement in self.registry.replacements() {
            if content.contains(&replacement.from) {
                content = content.replace(&replacement.from, &replacement.to);
                applied.push(replacement.clone());
            }
        }

        let kind = if applied.is_empty() {
            MigrationKind::Current
        } else {
            MigrationKind::Static
        };
        MigrationResult {
            query_id: query.query.id.clone(),
            file_path: query.query.file_path.clone(),
            operation_name: query.query.name.clone(),
            kind,
            recommendation: None,
            rewritten_content: (kind == MigrationKind::Static).then_some(content),
            applied_replacements: applied,
        }
    }

    /// Produce the advisory for a pattern query.
    pub fn recommend(&self, pattern: &NamePattern) -> MigrationRecommendation {
        if !pattern.is_deprecated {
            return MigrationRecommendation {
                should_migrate: false,
                target_pattern: None,
                target_name: None,
                reason: None,
                fragment_changes: Vec::new(),
                requires_manual_review: false,
                from_version: None,
                to_version: None,
            };
        }

        let entry = self.registry.entry(&pattern.pattern_key);
        let manifest = self.registry.manifest_entry(&pattern.property);

        // Manifest target first, then the registry's own migration path.
        let target_property = manifest
            .and_then(|m| m.target_property.clone())
            .or_else(|| {
                pattern.migration_path.as_ref().and_then(|version| {
                    self.registry
                        .property_for_version(&pattern.pattern_key, version)
                })
            });

        let to_version = target_property
            .as_ref()
            .and_then(|property| self.registry.pattern_for_property(property))
            .map(|target| target.version)
            .or_else(|| pattern.migration_path.clone());

        let target_name = entry
            .zip(to_version.as_ref())
            .and_then(|(entry, version)| entry.names.get(version).cloned());

        let fragment_changes = match manifest {
            Some(m) if !m.fragment_changes.is_empty() => m.fragment_changes.clone(),
            _ => synthesized_fragment_changes(
                entry,
                &pattern.version,
                to_version.as_deref(),
            ),
        };

        let reason = manifest
            .and_then(|m| m.reason.clone())
            .or_else(|| {
                entry.and_then(|entry| entry.deprecations.get(&pattern.version).cloned())
            });

        let skips_versions = entry
            .zip(to_version.as_ref())
            .map(|(entry, to)| version_gap(&entry.versions, &pattern.version, to) > 1)
            .unwrap_or(false);

        MigrationRecommendation {
            should_migrate: true,
            target_pattern: target_property,
            target_name,
            reason,
            requires_manual_review: !fragment_changes.is_empty() || skips_versions,
            fragment_changes,
            from_version: Some(pattern.version.clone()),
            to_version,
        }
    }
}

fn synthesized_fragment_changes(
    entry: Option<&crate::config::PatternEntryConfig>,
    from_version: &str,
    to_version: Option<&str>,
) -> Vec<FragmentChange> {
    let Some((entry, to_version)) = entry.zip(to_version) else {
        return Vec::new();
    };
    match (entry.fragments.get(from_version), entry.fragments.get(to_version)) {
        (Some(from), Some(to)) if from != to => vec![FragmentChange {
            from: from.clone(),
            to: to.clone(),
        }],
        _ => Vec::new(),
    }
}

fn version_gap(versions: &[String], from: &str, to: &str) -> usize {
    let index_of = |v: &str| versions.iter().position(|candidate| candidate == v);
    match (index_of(from), index_of(to)) {
        (Some(a), Some(b)) => b.saturating_sub(a),
        _ => 0,
    }
}

pub fn summarize(results: &[MigrationResult]) -> MigrationSummary {
    let mut summary = MigrationSummary {
        total: results.len(),
        ..Default::default()
    };

    for result in results {
        match result.kind {
            MigrationKind::Pattern => {
                let Some(rec) = &result.recommendation else {
                    continue;
                };
                if !rec.should_migrate {
                    continue;
                }
                summary.needs_migration += 1;
                summary.pattern_migrations += 1;
                if rec.requires_manual_review {
                    summary.requires_manual_review += 1;
                }
                if let (Some(from), Some(to)) = (&rec.from_version, &rec.to_version) {
                    *summary
                        .version_transitions
                        .entry(format!("{} → {}", from, to))
                        .or_insert(0) += 1;
                }
                summary.change_types.name += 1;
                summary.change_types.fragment += rec.fragment_changes.len();
            }
            MigrationKind::Static => {
                summary.needs_migration += 1;
                summary.static_migrations += 1;
                for replacement in &result.applied_replacements {
                    if replacement.from.contains('@') {
                        summary.change_types.directive += 1;
                    } else if replacement.from.contains("...")
                        || replacement.from.trim_start().starts_with("fragment")
                    {
                        summary.change_types.fragment += 1;
                    } else {
                        summary.change_types.name += 1;
                    }
                }
            }
            MigrationKind::Current => {}
        }
    }

    summary
}

/// Proposed name-table changes, one row per registry property that needs to
/// move.
fn name_table_diff(results: &[MigrationResult]) -> Vec<NameTableDiffEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut diff = Vec::new();

    for result in results {
        let Some(rec) = &result.recommendation else {
            continue;
        };
        if !rec.should_migrate {
            continue;
        }
        let Some(current_name) = &result.operation_name else {
            continue;
        };
        if !seen.insert(current_name.clone()) {
            continue;
        }
        diff.push(NameTableDiffEntry {
            pattern_key: rec
                .target_pattern
                .clone()
                .unwrap_or_else(|| current_name.clone()),
            property: current_name.clone(),
            current_name: current_name.clone(),
            target_property: rec.target_pattern.clone(),
            target_name: rec.target_name.clone(),
        });
    }

    diff
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{
        MigrationManifestEntry, PatternEntryConfig, PropertyBinding, RegistryConfig,
    };
    use crate::core::extract::{ExtractedQuery, OperationType, SourceLocation};
    use crate::core::resolve::ResolvedQuery;
    use std::collections::HashMap;

    fn registry() -> PatternRegistry {
        let mut config = RegistryConfig::default();
        for (property, version) in [("byIdV1", "V1"), ("byIdV3", "V3")] {
            config.properties.insert(
                property.to_string(),
                PropertyBinding {
                    pattern_key: "getById".to_string(),
                    version: version.to_string(),
                },
            );
        }
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
                deprecations: [("V1".to_string(), "superseded by V3".to_string())]
                    .into_iter()
                    .collect(),
                fragments: HashMap::new(),
                conditions: HashMap::new(),
            },
        );
        config.replacements.push(GlobalReplacement {
            from: "...ventureFields".to_string(),
            to: "...ventureInfinityStoneFields".to_string(),
        });
        config.migrations.insert(
            "queryNames.byIdV1".to_string(),
            MigrationManifestEntry {
                target_property: Some("byIdV3".to_string()),
                reason: Some("V1 misses infinity-stone data".to_string()),
                fragment_changes: Vec::new(),
            },
        );
        PatternRegistry::from_config(config).unwrap()
    }

    fn pattern_query(id: &str, property: &str, registry: &PatternRegistry) -> ResolvedQuery {
        let pattern = registry.pattern_for_property(property).unwrap();
        let mut query = ExtractedQuery {
            id: id.to_string(),
            file_path: "src/app.ts".to_string(),
            content: format!("query ${{queryNames.{}}} {{ venture {{ id }} }}", property),
            operation_type: OperationType::Query,
            name: None,
            location: SourceLocation::new(1, 0),
            needs_resolution: false,
            metadata: Default::default(),
        };
        query.metadata.pattern = Some(pattern);
        let mut resolved = ResolvedQuery::passthrough(query);
        resolved.resolved_content = "query getVentureById { venture { id } }".to_string();
        resolved
    }

    fn static_query(id: &str, content: &str) -> ResolvedQuery {
        ResolvedQuery::passthrough(ExtractedQuery {
            id: id.to_string(),
            file_path: "src/app.ts".to_string(),
            content: content.to_string(),
            operation_type: OperationType::Query,
            name: Some("getVentureStatic".to_string()),
            location: SourceLocation::new(1, 0),
            needs_resolution: false,
            metadata: Default::default(),
        })
    }

    #[test]
    fn test_deprecated_pattern_gets_recommendation() {
        let registry = registry();
        let advisor = MigrationAdvisor::new(&registry);
        let report = advisor.advise(&[pattern_query("q1", "byIdV1", &registry)]);

        let rec = report.results[0].recommendation.as_ref().unwrap();
        assert!(rec.should_migrate);
        assert_eq!(rec.target_pattern.as_deref(), Some("byIdV3"));
        assert_eq!(rec.target_name.as_deref(), Some("getVentureByIdV3"));
        assert_eq!(rec.reason.as_deref(), Some("V1 misses infinity-stone data"));
        // V1 -> V3 skips V2.
        assert!(rec.requires_manual_review);
        assert_eq!(report.summary.needs_migration, 1);
        assert_eq!(report.summary.version_transitions["V1 → V3"], 1);
    }

    #[test]
    fn test_current_pattern_needs_nothing() {
        let registry = registry();
        let advisor = MigrationAdvisor::new(&registry);
        let report = advisor.advise(&[pattern_query("q1", "byIdV3", &registry)]);
        let rec = report.results[0].recommendation.as_ref().unwrap();
        assert!(!rec.should_migrate);
        assert_eq!(report.summary.needs_migration, 0);
    }

    #[test]
    fn test_static_query_replacements() {
        let registry = registry();
        let advisor = MigrationAdvisor::new(&registry);
        let query = static_query("q1", "query getVentureStatic { venture { ...ventureFields } }");
        let mut query = query;
        query.resolved_content = query.query.content.clone();

        let report = advisor.advise(&[query]);
        let result = &report.results[0];
        assert_eq!(result.kind, MigrationKind::Static);
        assert_eq!(result.applied_replacements.len(), 1);
        assert!(
            result
                .rewritten_content
                .as_ref()
                .unwrap()
                .contains("...ventureInfinityStoneFields")
        );
        assert_eq!(report.summary.static_migrations, 1);
        assert_eq!(report.summary.change_types.fragment, 1);
    }

    #[test]
    fn test_static_query_without_matches_is_current() {
        let registry = registry();
        let advisor = MigrationAdvisor::new(&registry);
        let report = advisor.advise(&[static_query(
            "q1",
            "query getVentureStatic { venture { id name } }",
        )]);
        assert_eq!(report.results[0].kind, MigrationKind::Current);
        assert_eq!(report.summary.needs_migration, 0);
    }

    #[test]
    fn test_name_table_diff() {
        let registry = registry();
        let advisor = MigrationAdvisor::new(&registry);
        let report = advisor.advise(&[
            pattern_query("q1", "byIdV1", &registry),
            pattern_query("q2", "byIdV1", &registry),
        ]);
        // Deduplicated by current name.
        assert_eq!(report.name_table_diff.len(), 1);
        assert_eq!(report.name_table_diff[0].current_name, "getVentureByIdV1");
        assert_eq!(
            report.name_table_diff[0].target_name.as_deref(),
            Some("getVentureByIdV3")
        );
    }

    #[test]
    fn test_manual_review_on_fragment_change() {
        let mut config = RegistryConfig::default();
        config.properties.insert(
            "listV1".to_string(),
            PropertyBinding {
                pattern_key: "list".to_string(),
                version: "V1".to_string(),
            },
        );
        config.properties.insert(
            "listV2".to_string(),
            PropertyBinding {
                pattern_key: "list".to_string(),
                version: "V2".to_string(),
            },
        );
        config.patterns.insert(
            "list".to_string(),
            PatternEntryConfig {
                versions: vec!["V1".to_string(), "V2".to_string()],
                names: [
                    ("V1".to_string(), "listV1".to_string()),
                    ("V2".to_string(), "listV2".to_string()),
                ]
                .into_iter()
                .collect(),
                deprecations: [("V1".to_string(), "old".to_string())].into_iter().collect(),
                fragments: [
                    ("V1".to_string(), "listFields".to_string()),
                    ("V2".to_string(), "listFieldsV2".to_string()),
                ]
                .into_iter()
                .collect(),
                conditions: HashMap::new(),
            },
        );
        let registry = PatternRegistry::from_config(config).unwrap();
        let advisor = MigrationAdvisor::new(&registry);
        let pattern = registry.pattern_for_property("listV1").unwrap();
        let rec = advisor.recommend(&pattern);

        // Adjacent versions, but the fragment changes: manual review.
        assert_eq!(rec.fragment_changes.len(), 1);
        assert!(rec.requires_manual_review);
        assert_eq!(rec.to_version.as_deref(), Some("V2"));
    }
}
