//! Variant generation for conditionally-built templates.
//!
//! Templates can embed ternary-style choices in two shapes:
//! fragment-spread conditionals (`...${cond ? 'fragA' : 'fragB'}`) and
//! field/value conditionals (`${cond ? 'valA' : 'valB'}`). For a template
//! with k distinct condition variables, every one of the 2^k boolean
//! assignments yields one concrete query. Substitutions are applied in
//! reverse position order so earlier offsets stay valid, and each produced
//! text must parse as GraphQL or that single assignment is dropped.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::extract::ExtractedQuery;
use crate::core::parsers::graphql;
use crate::core::resolve::TemplateResolver;
use crate::core::result::ExtractionError;

static SPREAD_CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\.\.\.\s*\$\{\s*(\w+)\s*\?\s*['"]([^'"]*)['"]\s*:\s*['"]([^'"]*)['"]\s*\}"#,
    )
    .expect("valid regex")
});

static VALUE_CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$\{\s*(\w+)\s*\?\s*['"]([^'"]*)['"]\s*:\s*['"]([^'"]*)['"]\s*\}"#)
        .expect("valid regex")
});

/// How a condition site rewrites under an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplacementKind {
    FragmentSpread,
    Value,
}

/// One condition site found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionPattern {
    pub full_match: String,
    pub variable: String,
    pub true_value: String,
    pub false_value: String,
    pub kind: ReplacementKind,
    /// Byte offset of the site in the template.
    pub position: usize,
}

/// Ledger entry for one substitution performed in a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replacement {
    pub original: String,
    pub replaced: String,
    pub kind: ReplacementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantMetadata {
    pub original_query_id: String,
    /// Variable -> assigned boolean, covering every condition variable.
    pub conditions: BTreeMap<String, bool>,
    pub replacements: Vec<Replacement>,
}

/// One concrete query produced by a boolean assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryVariant {
    pub id: String,
    pub name: String,
    pub content: String,
    pub metadata: VariantMetadata,
}

/// Usage of a condition variable by one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchUsage {
    pub query_id: String,
    pub true_value: String,
    pub false_value: String,
}

/// A condition variable aggregated across the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSwitch {
    pub variable: String,
    /// Distinct branch literals observed for this variable.
    pub possible_values: Vec<String>,
    pub usages: Vec<SwitchUsage>,
}

/// Find every condition site in a template, sorted by position.
pub fn scan_condition_patterns(content: &str) -> Vec<ConditionPattern> {
    let mut patterns = Vec::new();
    let mut spread_ranges: Vec<(usize, usize)> = Vec::new();

    for caps in SPREAD_CONDITION_RE.captures_iter(content) {
        let m = caps.get(0).expect("full match");
        spread_ranges.push((m.start(), m.end()));
        patterns.push(ConditionPattern {
            full_match: m.as_str().to_string(),
            variable: caps[1].to_string(),
            true_value: caps[2].to_string(),
            false_value: caps[3].to_string(),
            kind: ReplacementKind::FragmentSpread,
            position: m.start(),
        });
    }

    for caps in VALUE_CONDITION_RE.captures_iter(content) {
        let m = caps.get(0).expect("full match");
        let inside_spread = spread_ranges
            .iter()
            .any(|&(start, end)| m.start() >= start && m.start() < end);
        if inside_spread {
            continue;
        }
        patterns.push(ConditionPattern {
            full_match: m.as_str().to_string(),
            variable: caps[1].to_string(),
            true_value: caps[2].to_string(),
            false_value: caps[3].to_string(),
            kind: ReplacementKind::Value,
            position: m.start(),
        });
    }

    patterns.sort_by_key(|pattern| pattern.position);
    patterns
}

/// Distinct condition variables in order of first appearance.
pub fn condition_variables(patterns: &[ConditionPattern]) -> Vec<String> {
    let mut variables = Vec::new();
    for pattern in patterns {
        if !variables.contains(&pattern.variable) {
            variables.push(pattern.variable.clone());
        }
    }
    variables
}

/// Result of enumerating one query's variants.
#[derive(Debug, Default)]
pub struct VariantOutcome {
    pub variants: Vec<QueryVariant>,
    pub errors: Vec<ExtractionError>,
    /// True when the template was skipped (too many condition variables).
    pub skipped: bool,
}

pub struct VariantGenerator<'a> {
    resolver: &'a TemplateResolver<'a>,
    max_condition_variables: usize,
}

impl<'a> VariantGenerator<'a> {
    pub fn new(resolver: &'a TemplateResolver<'a>, max_condition_variables: usize) -> Self {
        Self {
            resolver,
            max_condition_variables,
        }
    }

    /// Enumerate all 2^k assignments for a query's condition variables.
    ///
    /// A query with no condition sites passes through unchanged: the outcome
    /// carries no variants and no errors. An assignment whose substituted
    /// text fails to parse is dropped with a recorded error; the other
    /// assignments still produce variants.
    pub fn generate(&self, query: &ExtractedQuery) -> VariantOutcome {
        let mut outcome = VariantOutcome::default();
        let patterns = scan_condition_patterns(&query.content);
        if patterns.is_empty() {
            return outcome;
        }

        let variables = condition_variables(&patterns);
        if variables.len() > self.max_condition_variables {
            outcome.skipped = true;
            outcome.errors.push(ExtractionError::new(
                &query.file_path,
                format!(
                    "query '{}' has {} condition variables (limit {}); variants skipped",
                    query.id,
                    variables.len(),
                    self.max_condition_variables
                ),
            ));
            return outcome;
        }

        let base_name = query.name.clone().unwrap_or_else(|| "anonymous".to_string());

        for mask in 0u64..(1u64 << variables.len()) {
            let conditions: BTreeMap<String, bool> = variables
                .iter()
                .enumerate()
                .map(|(bit, variable)| (variable.clone(), mask >> bit & 1 == 1))
                .collect();

            let (content, replacements) = apply_assignment(&query.content, &patterns, &conditions);
            let resolved = self.resolver.resolve(&content);

            let assignment: Vec<String> = variables
                .iter()
                .map(|variable| format!("{}={}", variable, conditions[variable]))
                .collect();

            if !graphql::is_valid_document(&resolved.text) {
                outcome.errors.push(ExtractionError::new(
                    &query.file_path,
                    format!(
                        "variant of '{}' with {} is not valid GraphQL",
                        query.id,
                        assignment.join(",")
                    ),
                ));
                continue;
            }

            outcome.variants.push(QueryVariant {
                id: format!("{}[{}]", query.id, assignment.join(",")),
                name: format!("{}_{}", base_name, assignment.join("-")),
                content: resolved.text,
                metadata: VariantMetadata {
                    original_query_id: query.id.clone(),
                    conditions,
                    replacements,
                },
            });
        }

        outcome
    }
}

/// Substitute every condition site for one assignment, in reverse position
/// order so earlier offsets stay valid.
fn apply_assignment(
    content: &str,
    patterns: &[ConditionPattern],
    conditions: &BTreeMap<String, bool>,
) -> (String, Vec<Replacement>) {
    let mut text = content.to_string();
    let mut replacements = Vec::new();

    for pattern in patterns.iter().rev() {
        let value = if conditions[&pattern.variable] {
            &pattern.true_value
        } else {
            &pattern.false_value
        };
        let replaced = match pattern.kind {
            ReplacementKind::FragmentSpread => format!("...{}", value),
            ReplacementKind::Value => value.clone(),
        };
        text.replace_range(pattern.position..pattern.position + pattern.full_match.len(), &replaced);
        replacements.push(Replacement {
            original: pattern.full_match.clone(),
            replaced,
            kind: pattern.kind,
        });
    }

    replacements.reverse();
    (text, replacements)
}

/// Aggregate condition-variable usage across the run's raw templates.
pub fn collect_switches(queries: &[ExtractedQuery]) -> BTreeMap<String, VariantSwitch> {
    let mut switches: BTreeMap<String, VariantSwitch> = BTreeMap::new();

    for query in queries {
        for pattern in scan_condition_patterns(&query.content) {
            let switch = switches
                .entry(pattern.variable.clone())
                .or_insert_with(|| VariantSwitch {
                    variable: pattern.variable.clone(),
                    ..Default::default()
                });
            for value in [&pattern.true_value, &pattern.false_value] {
                if !switch.possible_values.contains(value) {
                    switch.possible_values.push(value.clone());
                }
            }
            switch.usages.push(SwitchUsage {
                query_id: query.id.clone(),
                true_value: pattern.true_value,
                false_value: pattern.false_value,
            });
        }
    }

    switches
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::extract::{OperationType, SourceLocation};
    use crate::core::resolve::ResolutionEnvironment;

    fn query(content: &str) -> ExtractedQuery {
        ExtractedQuery {
            id: "src/app.ts:0".to_string(),
            file_path: "src/app.ts".to_string(),
            content: content.to_string(),
            operation_type: OperationType::Query,
            name: Some("GetVenture".to_string()),
            location: SourceLocation::new(1, 0),
            needs_resolution: true,
            metadata: Default::default(),
        }
    }

    fn generate(content: &str) -> VariantOutcome {
        let env = ResolutionEnvironment::default();
        let resolver = TemplateResolver::new(&env, true, 10);
        let generator = VariantGenerator::new(&resolver, 6);
        generator.generate(&query(content))
    }

    #[test]
    fn test_scan_both_shapes() {
        let content =
            "query Q { v { ...${flag ? 'fragA' : 'fragB'} status(kind: \"${mode ? 'a' : 'b'}\") } }";
        let patterns = scan_condition_patterns(content);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].kind, ReplacementKind::FragmentSpread);
        assert_eq!(patterns[0].variable, "flag");
        assert_eq!(patterns[1].kind, ReplacementKind::Value);
        assert_eq!(patterns[1].variable, "mode");
    }

    #[test]
    fn test_single_variable_yields_two_variants() {
        let outcome = generate("query GetVenture { v { ...${flag ? 'fragA' : 'fragB'} id } }");
        assert_eq!(outcome.variants.len(), 2);
        assert!(outcome.errors.is_empty());

        let false_variant = &outcome.variants[0];
        assert_eq!(false_variant.metadata.conditions["flag"], false);
        assert!(false_variant.content.contains("...fragB"));

        let true_variant = &outcome.variants[1];
        assert_eq!(true_variant.metadata.conditions["flag"], true);
        assert!(true_variant.content.contains("...fragA"));
        assert_eq!(true_variant.name, "GetVenture_flag=true");
        assert_eq!(true_variant.id, "src/app.ts:0[flag=true]");
    }

    #[test]
    fn test_two_variables_yield_four_unique_assignments() {
        let outcome = generate(
            "query GetVenture { v { ...${a ? 'fragA' : 'fragB'} ...${b ? 'fragC' : 'fragD'} } }",
        );
        assert_eq!(outcome.variants.len(), 4);

        let mut assignments: Vec<(bool, bool)> = outcome
            .variants
            .iter()
            .map(|v| (v.metadata.conditions["a"], v.metadata.conditions["b"]))
            .collect();
        assignments.sort();
        assignments.dedup();
        assert_eq!(assignments.len(), 4);

        for variant in &outcome.variants {
            assert_eq!(variant.metadata.conditions.len(), 2);
        }
    }

    #[test]
    fn test_repeated_variable_counts_once() {
        let outcome = generate(
            "query Q { v { ...${flag ? 'fragA' : 'fragB'} w { ...${flag ? 'fragC' : 'fragD'} } } }",
        );
        // One distinct variable: two variants, both sites substituted
        // consistently.
        assert_eq!(outcome.variants.len(), 2);
        let true_variant = outcome
            .variants
            .iter()
            .find(|v| v.metadata.conditions["flag"])
            .unwrap();
        assert!(true_variant.content.contains("...fragA"));
        assert!(true_variant.content.contains("...fragC"));
        assert_eq!(true_variant.metadata.replacements.len(), 2);
    }

    #[test]
    fn test_no_conditionals_passes_through() {
        let outcome = generate("query GetVenture { v { id } }");
        assert!(outcome.variants.is_empty());
        assert!(outcome.errors.is_empty());
        assert!(!outcome.skipped);
    }

    #[test]
    fn test_invalid_assignment_dropped_others_kept() {
        // The false branch empties the selection set, producing invalid
        // GraphQL for that assignment only.
        let outcome = generate("query Q { v { ${flag ? 'id' : '}'} } }");
        assert_eq!(outcome.variants.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("flag=false"));
    }

    #[test]
    fn test_too_many_variables_skipped() {
        let content = format!(
            "query Q {{ v {{ {} }} }}",
            (0..7)
                .map(|i| format!("f{i}(k: \"${{v{i} ? 'a' : 'b'}}\")"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let env = ResolutionEnvironment::default();
        let resolver = TemplateResolver::new(&env, true, 10);
        let generator = VariantGenerator::new(&resolver, 6);
        let outcome = generator.generate(&query(&content));
        assert!(outcome.skipped);
        assert!(outcome.variants.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_replacement_ledger_order() {
        let outcome = generate(
            "query Q { v { ...${a ? 'fragA' : 'fragB'} x(k: \"${b ? 'one' : 'two'}\") } }",
        );
        let variant = &outcome.variants[0];
        // Ledger follows document order even though substitution ran in
        // reverse.
        assert_eq!(variant.metadata.replacements[0].kind, ReplacementKind::FragmentSpread);
        assert_eq!(variant.metadata.replacements[1].kind, ReplacementKind::Value);
    }

    #[test]
    fn test_collect_switches() {
        let queries = vec![
            query("query A { v { ...${flag ? 'fragA' : 'fragB'} } }"),
            query("query B { v { ...${flag ? 'fragA' : 'fragC'} } }"),
        ];
        let switches = collect_switches(&queries);
        assert_eq!(switches.len(), 1);
        let switch = &switches["flag"];
        assert_eq!(switch.possible_values, vec!["fragA", "fragB", "fragC"]);
        assert_eq!(switch.usages.len(), 2);
    }
}
