//! Core extraction engine.
//!
//! The pipeline runs in fixed phases over one run's query collection:
//!
//! 1. **Scanning**: source strategies find GraphQL templates per file
//! 2. **Resolution**: template interpolations and fragment closures
//! 3. **Analysis**: pattern names, condition switches, variants
//! 4. **Reporting**: fingerprints, duplicate groups, stats
//!
//! `context::ExtractionContext` orchestrates the phases and owns all
//! run-scoped state.

pub mod cache;
pub mod context;
pub mod extract;
pub mod file_scanner;
pub mod fingerprint;
pub mod naming;
pub mod parsers;
pub mod resolve;
pub mod result;
pub mod variants;

pub use cache::PersistentCache;
pub use context::ExtractionContext;
pub use extract::{ExtractedQuery, OperationType, QueryMetadata, SourceLocation};
pub use fingerprint::fingerprint;
pub use naming::{MigrationAdvisor, MigrationReport, NamePattern, PatternRegistry};
pub use resolve::{FragmentDefinition, FragmentIndex, ResolvedQuery, TemplateResolver};
pub use result::{ExtractionError, ExtractionResult, ExtractionStats};
pub use variants::{QueryVariant, VariantSwitch};
