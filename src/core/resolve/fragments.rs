//! Project-wide fragment index and per-query dependency resolution.
//!
//! Collection runs once per run as a barrier before any query resolution.
//! The dependency graph is an adjacency map (each definition records its own
//! spreads); closures are computed with an explicit work queue and visited
//! set, so cyclic graphs terminate with exactly-once inclusion.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use anyhow::Result;
use graphql_parser::query::{
    Definition, Document, FragmentDefinition as AstFragmentDefinition, InlineFragment, Selection,
    SelectionSet,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::parsers::graphql::{fragment_definitions, parse_document};

static LOOSE_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fragment\s+([A-Za-z_][A-Za-z0-9_]*)\s+on\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid regex")
});

/// A fragment definition collected from the project.
///
/// Shared read-only across all queries; queries reference fragments by name,
/// never by ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentDefinition {
    pub name: String,
    /// Printed definition text.
    pub body: String,
    pub file_path: String,
    /// Fragment names this definition itself spreads.
    pub dependencies: Vec<String>,
}

/// Closure of fragments a query transitively needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentResolution {
    /// Resolved definitions in discovery (BFS) order.
    pub fragments: Vec<FragmentDefinition>,
    /// Every fragment name reached, resolved or not, in discovery order.
    pub all_dependencies: Vec<String>,
    /// Referenced but undefined names. Warnings, not errors.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    fragments: HashMap<String, FragmentDefinition>,
}

impl FragmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. The first definition of a name wins; duplicate
    /// definitions elsewhere in the tree are ignored.
    pub fn insert(&mut self, definition: FragmentDefinition) {
        self.fragments
            .entry(definition.name.clone())
            .or_insert(definition);
    }

    /// Collect fragment definitions from a GraphQL document or a resolved
    /// template. Falls back to a lexical scan when the text does not parse.
    /// Returns the number of definitions found.
    pub fn collect_from_source(&mut self, file_path: &str, source: &str) -> usize {
        match fragment_definitions(source) {
            Ok(parsed) => {
                let count = parsed.len();
                for fragment in parsed {
                    self.insert(FragmentDefinition {
                        name: fragment.name,
                        body: fragment.body,
                        file_path: file_path.to_string(),
                        dependencies: fragment.dependencies,
                    });
                }
                count
            }
            Err(_) => self.collect_loose(file_path, source),
        }
    }

    /// Lexical fallback: find `fragment X on Y { ... }` blocks by brace
    /// matching. Used for templates that still contain interpolations.
    fn collect_loose(&mut self, file_path: &str, source: &str) -> usize {
        let mut count = 0;
        for m in LOOSE_FRAGMENT_RE.find_iter(source) {
            let Some(body) = balanced_block(source, m.start()) else {
                continue;
            };
            let name = LOOSE_FRAGMENT_RE
                .captures(&source[m.start()..])
                .map(|caps| caps[1].to_string())
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let dependencies = crate::core::parsers::graphql::direct_spreads(&body);
            self.insert(FragmentDefinition {
                name,
                body,
                file_path: file_path.to_string(),
                dependencies,
            });
            count += 1;
        }
        count
    }

    pub fn get(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.fragments.values()
    }

    /// Resolve the transitive closure of `direct` spreads.
    ///
    /// Breadth-first over the adjacency map with a visited set: cyclic graphs
    /// terminate, and every fragment appears exactly once.
    pub fn resolve(&self, direct: &[String]) -> FragmentResolution {
        let mut resolution = FragmentResolution::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = direct.iter().cloned().collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            resolution.all_dependencies.push(name.clone());
            match self.fragments.get(&name) {
                Some(definition) => {
                    for dependency in &definition.dependencies {
                        if !visited.contains(dependency) {
                            queue.push_back(dependency.clone());
                        }
                    }
                    resolution.fragments.push(definition.clone());
                }
                None => resolution.missing.push(name),
            }
        }

        resolution
    }
}

/// Extract the text from `start` through the matching close of the first
/// `{` block after it.
fn balanced_block(source: &str, start: usize) -> Option<String> {
    let bytes = source.as_bytes();
    let open = source[start..].find('{')? + start;
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(source[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Replace each fragment spread in `source` with the fragment's selection
/// set as an inline fragment, preserving directives on the spread.
///
/// Fragments that cannot be inlined (cyclic or undefined) keep their spread,
/// and their definitions are appended so the output stays self-contained.
pub fn inline_spreads(source: &str, fragments: &[FragmentDefinition]) -> Result<String> {
    let mut combined = source.to_string();
    for fragment in fragments {
        combined.push('\n');
        combined.push_str(&fragment.body);
    }
    let document = parse_document(&combined)?;

    let mut fragment_map: HashMap<String, AstFragmentDefinition<'_, String>> = HashMap::new();
    let mut operations = Vec::new();
    for definition in document.definitions {
        match definition {
            Definition::Fragment(fragment) => {
                fragment_map
                    .entry(fragment.name.clone())
                    .or_insert(fragment);
            }
            Definition::Operation(operation) => operations.push(operation),
        }
    }

    let mut out = Vec::new();
    let mut kept_spreads: HashSet<String> = HashSet::new();
    for operation in operations {
        let folded = fold_operation(operation, &fragment_map, &mut kept_spreads);
        out.push(Definition::Operation(folded));
    }

    // Keep definitions for spreads that survived folding (cycles).
    for name in &kept_spreads {
        if let Some(fragment) = fragment_map.get(name) {
            out.push(Definition::Fragment(fragment.clone()));
        }
    }

    let printed = Document { definitions: out }.to_string();
    Ok(printed.trim_end().to_string())
}

fn fold_operation<'a>(
    operation: graphql_parser::query::OperationDefinition<'a, String>,
    fragment_map: &HashMap<String, AstFragmentDefinition<'a, String>>,
    kept_spreads: &mut HashSet<String>,
) -> graphql_parser::query::OperationDefinition<'a, String> {
    use graphql_parser::query::OperationDefinition::*;

    let mut stack = Vec::new();
    match operation {
        SelectionSet(set) => SelectionSet(fold_set(set, fragment_map, &mut stack, kept_spreads)),
        Query(mut q) => {
            q.selection_set = fold_set(q.selection_set, fragment_map, &mut stack, kept_spreads);
            Query(q)
        }
        Mutation(mut m) => {
            m.selection_set = fold_set(m.selection_set, fragment_map, &mut stack, kept_spreads);
            Mutation(m)
        }
        Subscription(mut s) => {
            s.selection_set = fold_set(s.selection_set, fragment_map, &mut stack, kept_spreads);
            Subscription(s)
        }
    }
}

fn fold_set<'a>(
    set: SelectionSet<'a, String>,
    fragment_map: &HashMap<String, AstFragmentDefinition<'a, String>>,
    stack: &mut Vec<String>,
    kept_spreads: &mut HashSet<String>,
) -> SelectionSet<'a, String> {
    let items = set
        .items
        .into_iter()
        .map(|selection| match selection {
            Selection::Field(mut field) => {
                field.selection_set = fold_set(field.selection_set, fragment_map, stack, kept_spreads);
                Selection::Field(field)
            }
            Selection::InlineFragment(mut inline) => {
                inline.selection_set =
                    fold_set(inline.selection_set, fragment_map, stack, kept_spreads);
                Selection::InlineFragment(inline)
            }
            Selection::FragmentSpread(spread) => {
                if stack.contains(&spread.fragment_name) {
                    kept_spreads.insert(spread.fragment_name.clone());
                    return Selection::FragmentSpread(spread);
                }
                match fragment_map.get(&spread.fragment_name) {
                    Some(fragment) => {
                        stack.push(spread.fragment_name.clone());
                        let inner =
                            fold_set(fragment.selection_set.clone(), fragment_map, stack, kept_spreads);
                        stack.pop();
                        Selection::InlineFragment(InlineFragment {
                            position: spread.position,
                            type_condition: Some(fragment.type_condition.clone()),
                            directives: spread.directives,
                            selection_set: inner,
                        })
                    }
                    None => {
                        kept_spreads.insert(spread.fragment_name.clone());
                        Selection::FragmentSpread(spread)
                    }
                }
            }
        })
        .collect();

    SelectionSet {
        span: set.span,
        items,
    }
}
