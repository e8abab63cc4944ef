//! Run-level diagnostics and the final extraction result.
//!
//! Errors are append-only for the whole run and never abort processing; the
//! stats block is finalized once when the pipeline completes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::resolve::ResolvedQuery;
use crate::core::variants::{QueryVariant, VariantSwitch};

/// A non-fatal diagnostic recorded during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionError {
    pub file: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl ExtractionError {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(
        file: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.file, line, self.message),
            None => write!(f, "{}: {}", self.file, self.message),
        }
    }
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    pub files: usize,
    pub queries: usize,
    pub variants: usize,
    pub fragments: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

/// Final output of an extraction run.
///
/// Best-effort by construction: per-file and per-query failures land in
/// `errors` while everything that did resolve is present in full.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub queries: Vec<ResolvedQuery>,
    pub variants: Vec<QueryVariant>,
    /// Fragment name -> printed body, project-wide.
    pub fragments: BTreeMap<String, String>,
    /// Condition variable -> aggregated switch record.
    pub switches: BTreeMap<String, VariantSwitch>,
    /// Fingerprint -> ids of structurally identical queries (groups of 2+).
    pub duplicate_groups: BTreeMap<String, Vec<String>>,
    pub errors: Vec<ExtractionError>,
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    /// Queries grouped by content fingerprint, for dedup tooling.
    pub fn duplicate_queries(&self) -> BTreeMap<String, Vec<&ResolvedQuery>> {
        let mut groups: BTreeMap<String, Vec<&ResolvedQuery>> = BTreeMap::new();
        for query in &self.queries {
            if let Some(fp) = &query.fingerprint {
                groups.entry(fp.clone()).or_default().push(query);
            }
        }
        groups.retain(|_, queries| queries.len() > 1);
        groups
    }
}
