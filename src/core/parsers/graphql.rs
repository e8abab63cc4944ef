//! Thin wrappers over the GraphQL parser.
//!
//! Everything here works on borrowed text and returns owned data (names,
//! printed bodies), so no GraphQL AST lifetimes escape into the rest of the
//! pipeline.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use graphql_parser::query::{
    Definition, Document, OperationDefinition, ParseError, Selection, SelectionSet,
};
use regex::Regex;

use crate::core::extract::OperationType;

static OPERATION_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(query|mutation|subscription|fragment)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid regex")
});

static SPREAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\.\.\s*([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

pub fn parse_document(source: &str) -> Result<Document<'_, String>> {
    graphql_parser::parse_query::<String>(source)
        .map_err(|e: ParseError| anyhow!("GraphQL parse error: {}", e))
}

pub fn is_valid_document(source: &str) -> bool {
    graphql_parser::parse_query::<String>(source).is_ok()
}

/// Determine operation type and literal name from the leading tokens of a
/// template body, without requiring the body to be parseable (it may still
/// contain interpolation markers).
pub fn operation_header(source: &str) -> Option<(OperationType, Option<String>)> {
    let trimmed = skip_leading_comments(source);
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        // Anonymous shorthand operation.
        return Some((OperationType::Query, None));
    }

    let keyword = trimmed
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("");
    let op = OperationType::from_keyword(keyword)?;
    let name = OPERATION_NAME_RE
        .captures(trimmed)
        .map(|caps| caps[2].to_string());
    Some((op, name))
}

fn skip_leading_comments(source: &str) -> &str {
    let mut rest = source.trim_start();
    while rest.starts_with('#') {
        match rest.find('\n') {
            Some(idx) => rest = rest[idx + 1..].trim_start(),
            None => return "",
        }
    }
    rest
}

/// Collect fragment spread names from a selection set, recursively.
pub fn collect_spreads(set: &SelectionSet<'_, String>, out: &mut Vec<String>) {
    for selection in &set.items {
        match selection {
            Selection::Field(field) => collect_spreads(&field.selection_set, out),
            Selection::FragmentSpread(spread) => {
                if !out.contains(&spread.fragment_name) {
                    out.push(spread.fragment_name.clone());
                }
            }
            Selection::InlineFragment(inline) => collect_spreads(&inline.selection_set, out),
        }
    }
}

/// Fragment spreads referenced by the operations in `source`, in document
/// order. Falls back to a lexical scan when the text cannot be parsed
/// (unresolved templates).
pub fn direct_spreads(source: &str) -> Vec<String> {
    match parse_document(source) {
        Ok(doc) => {
            let mut out = Vec::new();
            for def in &doc.definitions {
                match def {
                    Definition::Operation(op) => {
                        collect_spreads(operation_selection_set(op), &mut out)
                    }
                    Definition::Fragment(frag) => collect_spreads(&frag.selection_set, &mut out),
                }
            }
            out
        }
        Err(_) => SPREAD_RE
            .captures_iter(source)
            .map(|caps| caps[1].to_string())
            .filter(|name| name != "on")
            .fold(Vec::new(), |mut acc, name| {
                if !acc.contains(&name) {
                    acc.push(name);
                }
                acc
            }),
    }
}

pub fn operation_selection_set<'a>(
    op: &'a OperationDefinition<'a, String>,
) -> &'a SelectionSet<'a, String> {
    match op {
        OperationDefinition::SelectionSet(set) => set,
        OperationDefinition::Query(q) => &q.selection_set,
        OperationDefinition::Mutation(m) => &m.selection_set,
        OperationDefinition::Subscription(s) => &s.selection_set,
    }
}

/// A fragment definition lifted out of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFragment {
    pub name: String,
    /// Canonical printed definition text.
    pub body: String,
    /// Fragment names this definition itself spreads.
    pub dependencies: Vec<String>,
}

/// Extract every fragment definition from a GraphQL document.
pub fn fragment_definitions(source: &str) -> Result<Vec<ParsedFragment>> {
    let doc = parse_document(source)?;
    let mut fragments = Vec::new();
    for def in doc.definitions {
        if let Definition::Fragment(frag) = def {
            let name = frag.name.clone();
            let mut dependencies = Vec::new();
            collect_spreads(&frag.selection_set, &mut dependencies);
            let body = Document {
                definitions: vec![Definition::Fragment(frag)],
            }
            .to_string();
            fragments.push(ParsedFragment {
                name,
                body: body.trim_end().to_string(),
                dependencies,
            });
        }
    }
    Ok(fragments)
}
