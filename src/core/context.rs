//! Extraction context and pipeline orchestrator.
//!
//! `ExtractionContext` owns the run-scoped state: configuration, the injected
//! pattern registry, the file set, the append-only error list, and a small
//! run-scoped memo cache. `run()` executes the pipeline phases in a fixed
//! order, each independently toggleable:
//!
//! `pattern-analysis → template-resolution → context-analysis →
//! name-analysis → variant-detection → fragment-resolution →
//! name-resolution → name-normalization → variant-generation →
//! fragment-inlining → reporting`
//!
//! A phase failing for one query or file never prevents the others from
//! completing; the run always terminates with a best-effort result plus the
//! accumulated error list.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context as _, Result, anyhow};
use colored::Colorize;
use glob::Pattern;
use rayon::prelude::*;

use crate::{
    cli::args::CommonArgs,
    config::{Config, RegistryConfig, load_config},
    core::{
        cache::PersistentCache,
        extract::{ExtractedQuery, OperationType, extract_file},
        file_scanner::scan_files,
        fingerprint::fingerprint,
        naming::PatternRegistry,
        parsers::graphql,
        resolve::{
            FragmentIndex, ResolutionEnvironment, ResolvedQuery, TemplateResolver, inline_spreads,
        },
        result::{ExtractionError, ExtractionResult, ExtractionStats},
        variants::{QueryVariant, VariantGenerator, collect_switches},
    },
};

/// Run-scoped orchestrator for one extraction.
pub struct ExtractionContext {
    /// Merged configuration (CLI args > config file > defaults).
    pub config: Config,

    /// Validated pattern registry, injected into every phase that needs it.
    pub registry: PatternRegistry,

    /// Raw registry configuration, kept for the resolution environment.
    registry_config: RegistryConfig,

    /// Project root directory.
    pub root_dir: PathBuf,

    /// All source files to analyze.
    pub files: HashSet<String>,

    /// Whether to print verbose diagnostic messages.
    pub verbose: bool,

    /// Whether the cross-run persistent cache is consulted and rewritten.
    pub use_cache: bool,

    /// Append-only diagnostics for the whole run. Mutex so parallel phases
    /// can append without lost updates.
    errors: Mutex<Vec<ExtractionError>>,

    /// Run-scoped memo cache keyed by `(kind, key)`. No eviction: it lives
    /// only as long as the run.
    memo: Mutex<HashMap<(String, String), String>>,
}

impl ExtractionContext {
    /// Create a context from command line arguments.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration preconditions: an invalid
    /// config file or a structurally invalid pattern registry.
    pub fn new(common_args: &CommonArgs) -> Result<Self> {
        let source_root = common_args
            .source_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let config_result = load_config(&source_root)?;
        if common_args.verbose && !config_result.from_file {
            eprintln!("Note: No .gqlexrc.json found, using default configuration");
        }

        let mut config = config_result.config;
        if let Some(registry_file) = &common_args.registry {
            config.registry_file = Some(registry_file.to_string_lossy().to_string());
        }

        Self::with_config(
            config,
            source_root,
            common_args.verbose,
            common_args.cache,
        )
    }

    /// Create a context from an already-built configuration. Used by library
    /// consumers and tests.
    pub fn with_config(
        config: Config,
        root_dir: PathBuf,
        verbose: bool,
        use_cache: bool,
    ) -> Result<Self> {
        config.validate()?;
        let registry_config = config.load_registry(&root_dir)?;
        let registry = PatternRegistry::from_config(registry_config.clone())?;

        let path = root_dir
            .to_str()
            .with_context(|| anyhow!("Invalid path: {:?}", root_dir))?;
        let scan_result = scan_files(
            path,
            &config.includes,
            &config.ignores,
            config.ignore_test_files,
            verbose,
        );
        if scan_result.skipped_count > 0 {
            eprintln!(
                "{} {} path(s) skipped due to access errors{}",
                "warning:".bold().yellow(),
                scan_result.skipped_count,
                if verbose { "" } else { " (use -v for details)" }
            );
        }

        Ok(Self {
            config,
            registry,
            registry_config,
            root_dir,
            files: scan_result.files,
            verbose,
            use_cache,
            errors: Mutex::new(Vec::new()),
            memo: Mutex::new(HashMap::new()),
        })
    }

    /// Record a non-fatal diagnostic. Safe to call from parallel phases.
    pub fn record_error(&self, error: ExtractionError) {
        self.errors.lock().expect("error list poisoned").push(error);
    }

    /// Run-scoped memoization keyed by `(kind, key)`.
    fn cached(&self, kind: &str, key: &str, compute: impl FnOnce() -> String) -> String {
        let memo_key = (kind.to_string(), key.to_string());
        if let Some(hit) = self.memo.lock().expect("memo poisoned").get(&memo_key) {
            return hit.clone();
        }
        let value = compute();
        self.memo
            .lock()
            .expect("memo poisoned")
            .insert(memo_key, value.clone());
        value
    }

    /// Execute the full pipeline and return the best-effort result.
    pub fn run(&self) -> ExtractionResult {
        let started = Instant::now();
        let toggles = self.config.phases.clone();

        // ============================================================
        // Load file contents (parallel reads)
        // ============================================================
        let mut contents: Vec<(String, String)> = {
            let read_results: Vec<_> = self
                .files
                .par_iter()
                .map(|file_path| {
                    (
                        file_path.clone(),
                        std::fs::read_to_string(file_path)
                            .map_err(|e| format!("Failed to read file: {}", e)),
                    )
                })
                .collect();

            let mut contents = Vec::new();
            for (file_path, result) in read_results {
                match result {
                    Ok(content) => contents.push((file_path, content)),
                    Err(message) => self.record_error(ExtractionError::new(file_path, message)),
                }
            }
            contents
        };
        contents.sort_by(|a, b| a.0.cmp(&b.0));

        // ============================================================
        // Source scanning (hybrid strategies, cache-aware)
        // ============================================================
        let mut raw_queries = self.scan_sources(&contents);
        raw_queries.sort_by(|a, b| {
            (a.file_path.as_str(), a.location.line, a.location.column).cmp(&(
                b.file_path.as_str(),
                b.location.line,
                b.location.column,
            ))
        });

        // Phase: pattern-analysis
        if toggles.pattern_analysis {
            for query in &mut raw_queries {
                if query.metadata.pattern.is_none() {
                    query.metadata.pattern = self.registry.detect_pattern(&query.content);
                }
            }
        }

        // Resolution environment: built once per run from the configured
        // fragment/name source files plus the registry config.
        let environment_files = self.environment_files(&contents);
        let environment = ResolutionEnvironment::build(&environment_files, &self.registry_config);
        let resolver = TemplateResolver::new(
            &environment,
            self.config.prefer_true_branch,
            self.config.max_resolution_iterations,
        );

        // Phase: template-resolution (parallel per query)
        let mut resolved: Vec<ResolvedQuery> = raw_queries
            .par_iter()
            .map(|query| {
                let mut resolved = ResolvedQuery::passthrough(query.clone());
                if toggles.template_resolution {
                    let outcome = resolver.resolve(&query.content);
                    resolved.query.needs_resolution =
                        !outcome.converged || query.content.trim().is_empty();
                    resolved.resolved_content = outcome.text;
                }
                resolved
            })
            .collect();

        // Phase: context-analysis. The strategies attach context metadata at
        // extraction time; disabling the phase drops it from the output.
        if !toggles.context_analysis {
            for resolved_query in &mut resolved {
                resolved_query.query.metadata.enclosing_function = None;
                resolved_query.query.metadata.enclosing_class = None;
                resolved_query.query.metadata.exported = false;
            }
        }

        // Phase: name-analysis - recover literal names exposed by resolution.
        if toggles.name_analysis {
            for resolved_query in &mut resolved {
                if resolved_query.query.name.is_none() {
                    if let Some((_, Some(name))) =
                        graphql::operation_header(&resolved_query.resolved_content)
                    {
                        resolved_query.query.name = Some(name);
                    }
                }
            }
        }

        // Phase: variant-detection - aggregate condition switches from the
        // raw (pre-resolution) templates.
        let switches = if toggles.variant_detection {
            collect_switches(&raw_queries)
        } else {
            BTreeMap::new()
        };

        // ============================================================
        // Phase: fragment-resolution. Collection is a barrier: the whole
        // index is built before any query's closure is resolved.
        // ============================================================
        let mut fragment_index = FragmentIndex::new();
        if toggles.fragment_resolution {
            for (file_path, content) in &contents {
                if matches!(
                    std::path::Path::new(file_path)
                        .extension()
                        .and_then(|e| e.to_str()),
                    Some("graphql" | "gql")
                ) {
                    fragment_index.collect_from_source(file_path, content);
                }
            }
            for (ident, text) in &environment.fragments {
                let origin = environment
                    .fragment_origins
                    .get(ident)
                    .map(String::as_str)
                    .unwrap_or("");
                fragment_index.collect_from_source(origin, text);
            }
            for resolved_query in &resolved {
                if resolved_query.resolved_content.contains("fragment") {
                    fragment_index.collect_from_source(
                        &resolved_query.query.file_path,
                        &resolved_query.resolved_content,
                    );
                }
            }

            for resolved_query in &mut resolved {
                let direct = graphql::direct_spreads(&resolved_query.resolved_content);
                let resolution = fragment_index.resolve(&direct);
                if self.verbose {
                    for missing in &resolution.missing {
                        eprintln!(
                            "{} {}: fragment '{}' is referenced but not defined",
                            "warning:".bold().yellow(),
                            resolved_query.query.file_path,
                            missing
                        );
                    }
                }
                resolved_query.resolved_fragments = resolution.fragments;
                resolved_query.all_dependencies = resolution.all_dependencies;
            }
        }

        // Phase: name-resolution - pattern queries take their registry name.
        if toggles.name_resolution {
            for resolved_query in &mut resolved {
                if let Some(pattern) = &resolved_query.query.metadata.pattern {
                    resolved_query.query.name = Some(pattern.resolved_name.clone());
                }
            }
        }

        // Phase: name-normalization - sane, reportable names everywhere.
        if toggles.name_normalization {
            for (index, resolved_query) in resolved.iter_mut().enumerate() {
                match &mut resolved_query.query.name {
                    Some(name) => *name = sanitize_operation_name(name),
                    None if resolved_query.query.operation_type != OperationType::Fragment => {
                        resolved_query.query.name =
                            Some(derive_operation_name(&resolved_query.query.file_path, index));
                    }
                    None => {}
                }
            }
        }

        // Phase: variant-generation (parallel, merged sequentially)
        let mut variants: Vec<QueryVariant> = Vec::new();
        if toggles.variant_generation {
            let generator = VariantGenerator::new(&resolver, self.config.max_condition_variables);
            let outcomes: Vec<_> = raw_queries
                .par_iter()
                .map(|query| generator.generate(query))
                .collect();
            for outcome in outcomes {
                for error in outcome.errors {
                    self.record_error(error);
                }
                variants.extend(outcome.variants);
            }
        }

        // Phase: fragment-inlining (opt-in)
        if toggles.fragment_inlining {
            for resolved_query in &mut resolved {
                if resolved_query.query.needs_resolution
                    || resolved_query.query.operation_type == OperationType::Fragment
                    || resolved_query.resolved_fragments.is_empty()
                {
                    continue;
                }
                match inline_spreads(
                    &resolved_query.resolved_content,
                    &resolved_query.resolved_fragments,
                ) {
                    Ok(inlined) => resolved_query.resolved_content = inlined,
                    Err(err) => self.record_error(ExtractionError::new(
                        &resolved_query.query.file_path,
                        format!("fragment inlining failed: {}", err),
                    )),
                }
            }
        }

        // Phase: reporting - fingerprints, duplicate groups, stats.
        let mut duplicate_groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if toggles.reporting {
            for resolved_query in &mut resolved {
                let print = self.cached("fingerprint", &resolved_query.resolved_content, || {
                    fingerprint(&resolved_query.resolved_content)
                });
                resolved_query.fingerprint = Some(print);
            }
            for resolved_query in &resolved {
                if let Some(print) = &resolved_query.fingerprint {
                    duplicate_groups
                        .entry(print.clone())
                        .or_default()
                        .push(resolved_query.query.id.clone());
                }
            }
            duplicate_groups.retain(|_, ids| ids.len() > 1);
        }

        let mut fragments = BTreeMap::new();
        for definition in fragment_index.iter() {
            fragments.insert(definition.name.clone(), definition.body.clone());
        }

        let errors = self.errors.lock().expect("error list poisoned").clone();
        let stats = ExtractionStats {
            files: self.files.len(),
            queries: resolved.len(),
            variants: variants.len(),
            fragments: fragments.len(),
            errors: errors.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        ExtractionResult {
            queries: resolved,
            variants,
            fragments,
            switches,
            duplicate_groups,
            errors,
            stats,
        }
    }

    /// Run the hybrid strategies over every file, short-circuiting through
    /// the persistent cache when enabled.
    fn scan_sources(&self, contents: &[(String, String)]) -> Vec<ExtractedQuery> {
        let mut cache = self
            .use_cache
            .then(|| PersistentCache::load(&self.root_dir.join(&self.config.cache_file), self.config.cache_max_age_secs));

        let mut queries = Vec::new();
        let mut to_extract: Vec<&(String, String)> = Vec::new();

        match &cache {
            Some(cache) => {
                for pair in contents {
                    match cache.lookup(&pair.0, &pair.1) {
                        Some(hit) => queries.extend(hit),
                        None => to_extract.push(pair),
                    }
                }
            }
            None => to_extract.extend(contents.iter()),
        }

        // Parallel extraction, sequential merge.
        let extractions: Vec<_> = to_extract
            .par_iter()
            .map(|(file_path, content)| {
                (
                    file_path.clone(),
                    content.clone(),
                    extract_file(file_path, content),
                )
            })
            .collect();

        for (file_path, content, extraction) in extractions {
            for error in extraction.errors {
                self.record_error(error);
            }
            if let Some(cache) = &mut cache {
                cache.store(&file_path, &content, extraction.queries.clone());
            }
            queries.extend(extraction.queries);
        }

        if let Some(cache) = &cache {
            if let Err(err) = cache.save() {
                self.record_error(ExtractionError::new(
                    self.config.cache_file.clone(),
                    format!("failed to write cache: {}", err),
                ));
            }
        }

        queries
    }

    /// Files that feed the resolution environment.
    fn environment_files(&self, contents: &[(String, String)]) -> Vec<(String, String)> {
        let patterns: Vec<Pattern> = self
            .config
            .fragment_files
            .iter()
            .filter_map(|pattern| Pattern::new(pattern).ok())
            .collect();

        contents
            .iter()
            .filter(|(file_path, _)| {
                patterns.iter().any(|pattern| pattern.matches(file_path))
                    || self
                        .config
                        .fragment_files
                        .iter()
                        .any(|suffix| file_path.ends_with(suffix))
            })
            .cloned()
            .collect()
    }
}

/// Keep operation names to identifier characters.
fn sanitize_operation_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

/// Stable fallback name for anonymous operations.
fn derive_operation_name(file_path: &str, index: usize) -> String {
    let stem = std::path::Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    format!("{}_{}", sanitize_operation_name(stem), index)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_sanitize_operation_name() {
        assert_eq!(sanitize_operation_name("GetVenture"), "GetVenture");
        assert_eq!(sanitize_operation_name("get-venture.v2"), "get_venture_v2");
        assert_eq!(sanitize_operation_name("3venture"), "_3venture");
    }

    #[test]
    fn test_derive_operation_name() {
        assert_eq!(derive_operation_name("src/app.page.ts", 4), "app_page_4");
    }
}
