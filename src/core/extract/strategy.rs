//! Strategy dispatch and the hybrid merge policy.
//!
//! Only two concrete scanners exist, so they form a closed enum rather than
//! an open trait-object hierarchy. `enum_dispatch` keeps call sites on the
//! trait while dispatch stays static.

use enum_dispatch::enum_dispatch;

use crate::core::extract::ast::AstStrategy;
use crate::core::extract::pluck::PluckStrategy;
use crate::core::extract::query::ExtractedQuery;
use crate::core::result::ExtractionError;

#[enum_dispatch]
pub trait ExtractStrategy {
    fn can_handle(&self, file_path: &str) -> bool;

    /// Extract raw queries from a file. Never fails: internal errors yield an
    /// empty result.
    fn extract(&self, file_path: &str, content: &str) -> Vec<ExtractedQuery>;
}

#[enum_dispatch(ExtractStrategy)]
#[derive(Debug, Clone, Copy)]
pub enum SourceStrategy {
    Pluck(PluckStrategy),
    Ast(AstStrategy),
}

impl ExtractStrategy for PluckStrategy {
    fn can_handle(&self, file_path: &str) -> bool {
        PluckStrategy::can_handle(self, file_path)
    }

    fn extract(&self, file_path: &str, content: &str) -> Vec<ExtractedQuery> {
        PluckStrategy::extract(self, file_path, content)
    }
}

impl ExtractStrategy for AstStrategy {
    fn can_handle(&self, file_path: &str) -> bool {
        AstStrategy::can_handle(self, file_path)
    }

    fn extract(&self, file_path: &str, content: &str) -> Vec<ExtractedQuery> {
        AstStrategy::extract(self, file_path, content)
    }
}

/// Result of running the strategies over a single file.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub queries: Vec<ExtractedQuery>,
    pub errors: Vec<ExtractionError>,
}

/// Run both strategies and merge.
///
/// AST results are strictly higher fidelity: when the structural strategy
/// returns anything for a file, its results fully replace the pluck results.
/// Otherwise the pluck results stand, and an AST parse failure is recorded as
/// a non-fatal error.
pub fn extract_file(file_path: &str, content: &str) -> FileExtraction {
    let mut extraction = FileExtraction::default();

    let pluck = PluckStrategy;
    let ast = AstStrategy;

    let pluck_queries = if ExtractStrategy::can_handle(&pluck, file_path) {
        ExtractStrategy::extract(&pluck, file_path, content)
    } else {
        Vec::new()
    };

    if AstStrategy::can_handle(&ast, file_path) {
        match ast.try_extract(file_path, content) {
            Ok(queries) if !queries.is_empty() => {
                extraction.queries = queries;
                return extraction;
            }
            Ok(_) => {}
            Err(err) => {
                if !pluck_queries.is_empty() {
                    extraction.errors.push(ExtractionError::new(
                        file_path,
                        format!("structural parse failed, using pluck results: {}", err),
                    ));
                }
            }
        }
    }

    extraction.queries = pluck_queries;
    extraction
}
