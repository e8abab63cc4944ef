//! Raw extracted-query data model.
//!
//! `ExtractedQuery` is the unit of work produced by the source strategies and
//! threaded through every later phase. It is immutable once produced except
//! for the additive `metadata` block, which later phases fill in copy-on-write
//! style (each phase consumes a collection and produces a new one).

use serde::{Deserialize, Serialize};

use crate::core::naming::NamePattern;

/// Kind of GraphQL definition found in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
    Fragment,
}

impl OperationType {
    /// Map a leading GraphQL keyword to an operation type.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "query" => Some(OperationType::Query),
            "mutation" => Some(OperationType::Mutation),
            "subscription" => Some(OperationType::Subscription),
            "fragment" => Some(OperationType::Fragment),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
            OperationType::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Position of a template in its source file (1-indexed line, 0-indexed column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Additive metadata attached to a query by later phases.
///
/// The AST strategy fills the context fields at extraction time; the pluck
/// strategy leaves them empty. `pattern` is attached by pattern analysis when
/// the operation name is a registry reference rather than a literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    /// Name of the function enclosing the template, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_function: Option<String>,
    /// Name of the class enclosing the template, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_class: Option<String>,
    /// True when the template (or its binding) is exported.
    #[serde(default)]
    pub exported: bool,
    /// The template tag as written in source (`gql`, `graphql.experimental`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Registry name-pattern info, when the operation name is dynamic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<NamePattern>,
}

/// A GraphQL template found in a source file, before resolution.
///
/// `content` is the template body as written, so it may still contain
/// `${...}` interpolation markers; `needs_resolution` tracks that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedQuery {
    /// Unique id within one extraction run (`<file>:<index>`).
    pub id: String,
    pub file_path: String,
    pub content: String,
    pub operation_type: OperationType,
    /// Literal operation name, when one was written in source.
    pub name: Option<String>,
    pub location: SourceLocation,
    /// True while the content still contains interpolation markers.
    pub needs_resolution: bool,
    #[serde(default)]
    pub metadata: QueryMetadata,
}

impl ExtractedQuery {
    pub fn make_id(file_path: &str, index: usize) -> String {
        format!("{}:{}", file_path, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_from_keyword() {
        assert_eq!(
            OperationType::from_keyword("query"),
            Some(OperationType::Query)
        );
        assert_eq!(
            OperationType::from_keyword("fragment"),
            Some(OperationType::Fragment)
        );
        assert_eq!(OperationType::from_keyword("type"), None);
    }

    #[test]
    fn test_make_id() {
        assert_eq!(
            ExtractedQuery::make_id("src/app.ts", 2),
            "src/app.ts:2"
        );
    }
}
