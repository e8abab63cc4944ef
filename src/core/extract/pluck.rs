//! Lexical pluck strategy.
//!
//! Locates GraphQL-tagged template literals by lightweight scanning, without
//! parsing the surrounding JS/TS. Tolerant of files the structural parser
//! cannot handle, which makes it the fallback half of the hybrid merge.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::extract::query::{ExtractedQuery, SourceLocation};
use crate::core::extract::{infer_operation, offset_to_location};
use crate::core::parsers::graphql;
use crate::utils::has_interpolation;

/// Tag identifiers that mark a template as GraphQL, including member tags
/// such as `graphql.experimental`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w$.])((?:gql|graphql|GraphQL)(?:\.[A-Za-z_$][\w$]*)*)\s*`")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PluckStrategy;

impl PluckStrategy {
    pub fn can_handle(&self, file_path: &str) -> bool {
        matches!(
            std::path::Path::new(file_path)
                .extension()
                .and_then(|e| e.to_str()),
            Some("ts" | "tsx" | "js" | "jsx" | "graphql" | "gql")
        )
    }

    /// Extract raw queries from a file. Never fails; files that cannot be
    /// scanned simply yield no results.
    pub fn extract(&self, file_path: &str, content: &str) -> Vec<ExtractedQuery> {
        if is_graphql_file(file_path) {
            return extract_graphql_document(file_path, content);
        }
        extract_tagged_templates(file_path, content)
    }
}

fn is_graphql_file(file_path: &str) -> bool {
    matches!(
        std::path::Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str()),
        Some("graphql" | "gql")
    )
}

fn extract_tagged_templates(file_path: &str, content: &str) -> Vec<ExtractedQuery> {
    let mut queries = Vec::new();
    let bytes = content.as_bytes();

    for caps in TAG_RE.captures_iter(content) {
        let tag = caps.get(1).expect("tag group").as_str().to_string();
        let body_start = caps.get(0).expect("full match").end();
        let Some(body_end) = find_template_end(bytes, body_start) else {
            continue;
        };
        let body = &content[body_start..body_end];

        let Some((operation_type, name)) = infer_operation(body) else {
            continue;
        };

        let location = offset_to_location(content, body_start);
        let index = queries.len();
        queries.push(ExtractedQuery {
            id: ExtractedQuery::make_id(file_path, index),
            file_path: file_path.to_string(),
            content: body.to_string(),
            operation_type,
            name,
            location,
            needs_resolution: has_interpolation(body),
            metadata: crate::core::extract::query::QueryMetadata {
                tag: Some(tag),
                ..Default::default()
            },
        });
    }

    queries
}

/// Scan forward from `start` (just past the opening backtick) to the closing
/// backtick, skipping escapes and tracking `${ ... }` nesting so that
/// backticks inside interpolations do not terminate the template.
fn find_template_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'`' if depth == 0 => return Some(i),
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' if depth > 0 => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

/// A `.graphql`/`.gql` file is a document of its own: one query per
/// definition when it parses, the whole file as a single raw query otherwise.
fn extract_graphql_document(file_path: &str, content: &str) -> Vec<ExtractedQuery> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    if graphql::is_valid_document(content) {
        let mut queries = Vec::new();
        for chunk in split_definitions(content) {
            let Some((operation_type, name)) = infer_operation(&chunk.text) else {
                continue;
            };
            let index = queries.len();
            queries.push(ExtractedQuery {
                id: ExtractedQuery::make_id(file_path, index),
                file_path: file_path.to_string(),
                content: chunk.text,
                operation_type,
                name,
                location: chunk.location,
                needs_resolution: false,
                metadata: Default::default(),
            });
        }
        return queries;
    }

    match infer_operation(content) {
        Some((operation_type, name)) => vec![ExtractedQuery {
            id: ExtractedQuery::make_id(file_path, 0),
            file_path: file_path.to_string(),
            content: content.to_string(),
            operation_type,
            name,
            location: SourceLocation::new(1, 0),
            needs_resolution: has_interpolation(content),
            metadata: Default::default(),
        }],
        None => Vec::new(),
    }
}

struct DefinitionChunk {
    text: String,
    location: SourceLocation,
}

/// Split a valid document into top-level definition chunks by brace
/// balancing, keeping the original text of each definition.
fn split_definitions(content: &str) -> Vec<DefinitionChunk> {
    let mut chunks = Vec::new();
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut chunk_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(start) = chunk_start.take() {
                        let text = content[start..=i].trim().to_string();
                        chunks.push(DefinitionChunk {
                            text,
                            location: offset_to_location(content, start),
                        });
                    }
                }
            }
            b if chunk_start.is_none() && depth == 0 && !b.is_ascii_whitespace() => {
                chunk_start = Some(i);
            }
            _ => {}
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::extract::OperationType;

    #[test]
    fn test_can_handle() {
        let strategy = PluckStrategy;
        assert!(strategy.can_handle("src/app.tsx"));
        assert!(strategy.can_handle("src/queries.graphql"));
        assert!(!strategy.can_handle("src/style.css"));
    }

    #[test]
    fn test_extract_tagged_template() {
        let content = r#"
            import { gql } from '@apollo/client';
            const QUERY = gql`query GetVenture { venture { id } }`;
        "#;
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].operation_type, OperationType::Query);
        assert_eq!(queries[0].name.as_deref(), Some("GetVenture"));
        assert_eq!(queries[0].metadata.tag.as_deref(), Some("gql"));
        assert!(!queries[0].needs_resolution);
    }

    #[test]
    fn test_extract_member_tag() {
        let content = "const Q = graphql.experimental`query X { a }`;";
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].metadata.tag.as_deref(),
            Some("graphql.experimental")
        );
    }

    #[test]
    fn test_extract_flags_interpolated_template() {
        let content = "const Q = gql`query ${queryNames.byIdV1} { venture { ...${frag} } }`;";
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries.len(), 1);
        assert!(queries[0].needs_resolution);
        assert_eq!(queries[0].name, None);
    }

    #[test]
    fn test_extract_skips_non_graphql_templates() {
        let content = "const css = styled`color: red;`; const s = `hello`;";
        assert!(PluckStrategy.extract("src/app.ts", content).is_empty());
    }

    #[test]
    fn test_extract_multiple_templates_get_distinct_ids() {
        let content = r#"
            const A = gql`query A { a }`;
            const B = gql`mutation B { b }`;
        "#;
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].id, "src/app.ts:0");
        assert_eq!(queries[1].id, "src/app.ts:1");
        assert_eq!(queries[1].operation_type, OperationType::Mutation);
    }

    #[test]
    fn test_template_end_skips_interpolation_braces() {
        let content = "const Q = gql`query { field(arg: \"${a ? `x` : `y`}\") }`;";
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries.len(), 1);
        assert!(queries[0].content.contains("${a ? `x` : `y`}"));
    }

    #[test]
    fn test_extract_graphql_file() {
        let content = "query GetA { a }\n\nfragment f on A { id }\n";
        let queries = PluckStrategy.extract("src/ops.graphql", content);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].name.as_deref(), Some("GetA"));
        assert_eq!(queries[1].operation_type, OperationType::Fragment);
    }

    #[test]
    fn test_extract_records_location() {
        let content = "\n\nconst Q = gql`query A { a }`;";
        let queries = PluckStrategy.extract("src/app.ts", content);
        assert_eq!(queries[0].location.line, 3);
    }
}
