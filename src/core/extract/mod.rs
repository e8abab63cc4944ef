//! Source scanning - finding GraphQL templates in project files.
//!
//! Two interchangeable scanners feed the pipeline: a lexical pluck scan and a
//! full structural (swc) parse. The hybrid merge in `strategy` prefers the
//! structural results per file and falls back to pluck output.

pub mod ast;
pub mod pluck;
pub mod query;
pub mod strategy;

pub use ast::AstStrategy;
pub use pluck::PluckStrategy;
pub use query::{ExtractedQuery, OperationType, QueryMetadata, SourceLocation};
pub use strategy::{ExtractStrategy, FileExtraction, SourceStrategy, extract_file};

use std::sync::LazyLock;

use regex::Regex;

use crate::core::parsers::graphql::operation_header;

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(query|mutation|subscription|fragment)\b").expect("valid regex")
});

/// Infer the operation type and name for a template body.
///
/// Uses the leading tokens when they form an operation header; otherwise
/// searches for the first operation keyword anywhere in the body (templates
/// can open with interpolated fragments). Returns `None` for bodies that do
/// not look like GraphQL at all.
pub fn infer_operation(body: &str) -> Option<(OperationType, Option<String>)> {
    if let Some(header) = operation_header(body) {
        return Some(header);
    }

    if let Some(m) = KEYWORD_RE.find(body) {
        return operation_header(&body[m.start()..]);
    }

    None
}

/// Translate a byte offset into a 1-indexed line and 0-indexed column.
pub fn offset_to_location(content: &str, offset: usize) -> SourceLocation {
    let prefix = &content[..offset.min(content.len())];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(idx) => offset - idx - 1,
        None => offset,
    };
    SourceLocation::new(line, column)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_infer_operation_leading_fragment_interpolation() {
        let body = "${ventureFragment}\nquery GetVenture { venture { id } }";
        let (op, name) = infer_operation(body).unwrap();
        assert_eq!(op, OperationType::Query);
        assert_eq!(name.as_deref(), Some("GetVenture"));
    }

    #[test]
    fn test_infer_operation_rejects_css() {
        assert_eq!(infer_operation("color: red; margin: 0;"), None);
    }

    #[test]
    fn test_offset_to_location() {
        let content = "line one\nline two\nline three";
        assert_eq!(offset_to_location(content, 0), SourceLocation::new(1, 0));
        assert_eq!(offset_to_location(content, 9), SourceLocation::new(2, 0));
        assert_eq!(offset_to_location(content, 14), SourceLocation::new(2, 5));
    }
}
