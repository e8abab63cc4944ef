//! Resolution - turning raw templates into literal GraphQL.
//!
//! Two resolvers run here: the template resolver substitutes `${...}`
//! interpolations from the run's resolution environment, and the fragment
//! resolver computes each query's transitive fragment closure against the
//! project-wide index.

pub mod environment;
pub mod fragments;
pub mod template;

pub use environment::ResolutionEnvironment;
pub use fragments::{FragmentDefinition, FragmentIndex, FragmentResolution, inline_spreads};
pub use template::{ResolutionOutcome, TemplateInterpolation, TemplateResolver};

use serde::Serialize;

use crate::core::extract::ExtractedQuery;

/// An extracted query with fully literal GraphQL text and its fragment
/// closure.
///
/// Invariant: when `query.needs_resolution` is false, `resolved_content`
/// contains no `${` markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedQuery {
    #[serde(flatten)]
    pub query: ExtractedQuery,
    pub resolved_content: String,
    /// Fragment definitions this query transitively needs, in discovery order.
    pub resolved_fragments: Vec<FragmentDefinition>,
    /// Every fragment name reached during resolution, resolved or not.
    pub all_dependencies: Vec<String>,
    /// Content fingerprint, attached during reporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl ResolvedQuery {
    /// Wrap a query whose content needed no resolution work.
    pub fn passthrough(query: ExtractedQuery) -> Self {
        let resolved_content = query.content.clone();
        Self {
            query,
            resolved_content,
            resolved_fragments: Vec::new(),
            all_dependencies: Vec::new(),
            fingerprint: None,
        }
    }
}
