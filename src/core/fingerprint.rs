//! Content fingerprinting for duplicate detection.
//!
//! Canonicalization parses the resolved query, strips operation names and
//! all source positions (re-printing drops them), substitutes one canonical
//! placeholder for any residual interpolation marker, and hashes the result.
//! Queries that cannot be parsed fall back to textual normalization, so
//! fingerprinting never fails.

use std::sync::LazyLock;

use graphql_parser::query::{Definition, OperationDefinition};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::core::parsers::graphql::parse_document;

const PLACEHOLDER: &str = "__dynamic__";

/// Number of leading hex characters kept from the digest. Collisions at this
/// width are acceptable for grouping.
const FINGERPRINT_LEN: usize = 16;

static INTERPOLATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("valid regex"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^\n]*").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Stable hash of a query body's structural identity.
pub fn fingerprint(content: &str) -> String {
    let canonical = canonicalize(content).unwrap_or_else(|| normalize_textual(content));
    let canonical = INTERPOLATION_RE
        .replace_all(&canonical, PLACEHOLDER)
        .into_owned();

    let digest = Sha256::digest(canonical.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..FINGERPRINT_LEN].to_string()
}

/// Parse, strip operation names, and re-print. `None` when the content is
/// not parseable GraphQL.
fn canonicalize(content: &str) -> Option<String> {
    let mut document = parse_document(content).ok()?;
    for definition in &mut document.definitions {
        if let Definition::Operation(operation) = definition {
            match operation {
                OperationDefinition::Query(q) => q.name = None,
                OperationDefinition::Mutation(m) => m.name = None,
                OperationDefinition::Subscription(s) => s.name = None,
                OperationDefinition::SelectionSet(_) => {}
            }
        }
    }
    Some(document.to_string())
}

/// Fallback for unparseable content: drop comments, collapse whitespace.
fn normalize_textual(content: &str) -> String {
    let text = COMMENT_RE.replace_all(content, "");
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}
