use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Ok, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".gqlexrc.json";

pub const TEST_FILE_PATTERNS: &[&str] = &[
    "**/*.test.tsx",
    "**/*.test.ts",
    "**/*.test.jsx",
    "**/*.test.js",
    "**/*.spec.tsx",
    "**/*.spec.ts",
    "**/*.spec.jsx",
    "**/*.spec.js",
    "**/__tests__/**",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub ignores: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default = "default_source_root")]
    pub source_root: String,
    /// Files scanned once per run for exported fragment constants and the
    /// shared name-registry object. Literal paths or glob patterns,
    /// relative to the source root.
    #[serde(default = "default_fragment_files")]
    pub fragment_files: Vec<String>,
    /// Path to the pattern-registry JSON document. Ignored when an inline
    /// `registry` section is present.
    #[serde(default)]
    pub registry_file: Option<String>,
    /// Inline pattern-registry configuration.
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default = "default_ignore_test_files")]
    pub ignore_test_files: bool,
    /// When a boolean condition cannot be resolved statically, assume the
    /// true branch. Mirrors the run-time default of the codebases this tool
    /// is pointed at; flip per project if the false branch is the common one.
    #[serde(default = "default_true")]
    pub prefer_true_branch: bool,
    #[serde(default = "default_max_resolution_iterations")]
    pub max_resolution_iterations: usize,
    /// Upper bound on distinct condition variables per template. A template
    /// beyond this would enumerate > 2^n variants; it is skipped with a
    /// recorded error instead.
    #[serde(default = "default_max_condition_variables")]
    pub max_condition_variables: usize,
    #[serde(default)]
    pub phases: PhaseToggles,
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
}

/// Per-phase on/off switches for the extraction pipeline.
///
/// Every phase defaults to enabled; disabling a phase skips it while keeping
/// the rest of the pipeline order intact.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseToggles {
    #[serde(default = "default_true")]
    pub pattern_analysis: bool,
    #[serde(default = "default_true")]
    pub template_resolution: bool,
    #[serde(default = "default_true")]
    pub context_analysis: bool,
    #[serde(default = "default_true")]
    pub name_analysis: bool,
    #[serde(default = "default_true")]
    pub variant_detection: bool,
    #[serde(default = "default_true")]
    pub fragment_resolution: bool,
    #[serde(default = "default_true")]
    pub name_resolution: bool,
    #[serde(default = "default_true")]
    pub name_normalization: bool,
    #[serde(default = "default_true")]
    pub variant_generation: bool,
    #[serde(default)]
    pub fragment_inlining: bool,
    #[serde(default = "default_true")]
    pub reporting: bool,
}

impl Default for PhaseToggles {
    fn default() -> Self {
        Self {
            pattern_analysis: true,
            template_resolution: true,
            context_analysis: true,
            name_analysis: true,
            variant_detection: true,
            fragment_resolution: true,
            name_resolution: true,
            name_normalization: true,
            variant_generation: true,
            fragment_inlining: false,
            reporting: true,
        }
    }
}

// ============================================================
// Pattern registry configuration
// ============================================================

/// Structured pattern-registry configuration.
///
/// This replaces the upstream practice of evaluating a source file to obtain
/// the name registry: the registry is plain JSON, loaded and validated once
/// at startup, then handed to the pipeline as an explicit object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Identifier of the shared registry object in source code
    /// (e.g. `queryNames` in `${queryNames.byIdV1}`).
    #[serde(default = "default_registry_object")]
    pub registry_object: String,
    /// property -> logical pattern family + version.
    #[serde(default)]
    pub properties: HashMap<String, PropertyBinding>,
    /// patternKey -> versioned entry.
    #[serde(default)]
    pub patterns: HashMap<String, PatternEntryConfig>,
    /// Fully-qualified property (`queryNames.byIdV1`) -> migration advisory.
    #[serde(default)]
    pub migrations: HashMap<String, MigrationManifestEntry>,
    /// Literal-text replacements applied to fully static queries only.
    #[serde(default)]
    pub replacements: Vec<GlobalReplacement>,
    /// Non-pattern registry names: property -> literal operation name.
    /// Used by template resolution for plain `${queryNames.xyz}` lookups.
    #[serde(default)]
    pub names: HashMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_object: default_registry_object(),
            properties: HashMap::new(),
            patterns: HashMap::new(),
            migrations: HashMap::new(),
            replacements: Vec::new(),
            names: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyBinding {
    pub pattern_key: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternEntryConfig {
    /// Ordered version list, oldest first.
    pub versions: Vec<String>,
    /// version -> literal operation name.
    #[serde(default)]
    pub names: HashMap<String, String>,
    /// version -> deprecation reason.
    #[serde(default)]
    pub deprecations: HashMap<String, String>,
    /// version -> required fragment name.
    #[serde(default)]
    pub fragments: HashMap<String, String>,
    /// version -> required feature flags.
    #[serde(default)]
    pub conditions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationManifestEntry {
    /// Registry property to migrate to (e.g. `byIdV3`).
    #[serde(default)]
    pub target_property: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub fragment_changes: Vec<FragmentChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReplacement {
    pub from: String,
    pub to: String,
}

fn default_source_root() -> String {
    "./".to_string()
}

fn default_fragment_files() -> Vec<String> {
    [
        "**/fragments.ts",
        "**/fragments.js",
        "**/queryNames.ts",
        "**/queryNames.js",
    ]
    .map(String::from)
    .to_vec()
}

fn default_ignore_test_files() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_max_resolution_iterations() -> usize {
    10
}

fn default_max_condition_variables() -> usize {
    6
}

fn default_cache_file() -> String {
    ".gqlex-cache.json".to_string()
}

fn default_cache_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_registry_object() -> String {
    "queryNames".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignores: Vec::new(),
            includes: Vec::new(),
            source_root: default_source_root(),
            fragment_files: default_fragment_files(),
            registry_file: None,
            registry: None,
            ignore_test_files: default_ignore_test_files(),
            prefer_true_branch: true,
            max_resolution_iterations: default_max_resolution_iterations(),
            max_condition_variables: default_max_condition_variables(),
            phases: PhaseToggles::default(),
            cache_file: default_cache_file(),
            cache_max_age_secs: default_cache_max_age_secs(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Returns an error if any glob patterns in `ignores`, `includes`, or
    /// `fragmentFiles` are invalid.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.ignores {
            Pattern::new(pattern)
                .with_context(|| format!("Invalid glob pattern in 'ignores': \"{}\"", pattern))?;
        }

        // Include patterns without wildcards are literal directory paths.
        for pattern in &self.includes {
            if pattern.contains('*') || pattern.contains('?') {
                Pattern::new(pattern).with_context(|| {
                    format!("Invalid glob pattern in 'includes': \"{}\"", pattern)
                })?;
            }
        }

        for pattern in &self.fragment_files {
            if pattern.contains('*') || pattern.contains('?') {
                Pattern::new(pattern).with_context(|| {
                    format!("Invalid glob pattern in 'fragmentFiles': \"{}\"", pattern)
                })?;
            }
        }

        Ok(())
    }

    /// Load the registry configuration: inline section first, then
    /// `registryFile`, then an empty default.
    pub fn load_registry(&self, root_dir: &Path) -> Result<RegistryConfig> {
        if let Some(registry) = &self.registry {
            return Ok(registry.clone());
        }

        let Some(file) = &self.registry_file else {
            return Ok(RegistryConfig::default());
        };

        let path = if Path::new(file).is_absolute() {
            PathBuf::from(file)
        } else {
            root_dir.join(file)
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read registry file: {:?}", path))?;
        let registry: RegistryConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry file: {:?}", path))?;
        Ok(registry)
    }
}

pub fn default_config_json() -> Result<String> {
    let config = Config::default();
    serde_json::to_string_pretty(&config).context("Failed to generate default config.")
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Result of loading configuration.
pub struct ConfigLoadResult {
    pub config: Config,
    /// True if config was loaded from a file, false if using defaults.
    pub from_file: bool,
}

pub fn load_config(start_dir: &Path) -> Result<ConfigLoadResult> {
    match find_config_file(start_dir) {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.validate()?;
            Ok(ConfigLoadResult {
                config,
                from_file: true,
            })
        }
        None => Ok(ConfigLoadResult {
            config: Config::default(),
            from_file: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.ignores.is_empty());
        assert!(config.includes.is_empty());
        assert_eq!(config.max_resolution_iterations, 10);
        assert!(config.prefer_true_branch);
        assert!(config.phases.variant_generation);
        assert!(!config.phases.fragment_inlining);
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{
              "ignores": ["**/dist/**"],
              "includes": ["src/**"],
              "fragmentFiles": ["src/graphql/fragments.ts"]
          }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.ignores, vec!["**/dist/**"]);
        assert_eq!(config.includes, vec!["src/**"]);
        assert_eq!(config.fragment_files, vec!["src/graphql/fragments.ts"]);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "ignores": ["**/dist/**"] }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.ignores, vec!["**/dist/**"]);
        assert_eq!(config.fragment_files, default_fragment_files());
        assert!(config.ignore_test_files);
    }

    #[test]
    fn test_phase_toggle_override() {
        let json = r#"{ "phases": { "variantGeneration": false } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(!config.phases.variant_generation);
        assert!(config.phases.template_resolution);
    }

    #[test]
    fn test_parse_registry_config() {
        let json = r#"{
            "registryObject": "queryNames",
            "properties": {
                "byIdV1": { "patternKey": "getById", "version": "V1" }
            },
            "patterns": {
                "getById": {
                    "versions": ["V1", "V3"],
                    "names": { "V1": "getVentureByIdV1", "V3": "getVentureByIdV3" },
                    "deprecations": { "V1": "superseded by V3" }
                }
            },
            "migrations": {
                "queryNames.byIdV1": {
                    "targetProperty": "byIdV3",
                    "reason": "V1 drops infinity-stone data"
                }
            }
        }"#;
        let registry: RegistryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(registry.registry_object, "queryNames");
        assert_eq!(registry.properties["byIdV1"].pattern_key, "getById");
        assert_eq!(registry.patterns["getById"].versions, vec!["V1", "V3"]);
        assert!(registry.migrations.contains_key("queryNames.byIdV1"));
    }

    #[test]
    fn test_find_config_file() {
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("src").join("components");
        fs::create_dir_all(&sub_dir).unwrap();

        let config_path = dir.path().join(CONFIG_FILE_NAME);
        File::create(&config_path).unwrap();

        let found = find_config_file(&sub_dir);
        assert!(found.is_some());
        assert_eq!(found.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let found = find_config_file(dir.path());
        assert!(found.is_none());
    }

    #[test]
    fn test_load_config_default_when_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let result = load_config(dir.path()).unwrap();
        assert!(!result.from_file);
        assert!(result.config.ignores.is_empty());
    }

    #[test]
    fn test_validate_invalid_ignore_pattern() {
        let config = Config {
            ignores: vec!["[invalid".to_string()], // unclosed bracket
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ignores"));
    }

    #[test]
    fn test_load_registry_from_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("registry.json"),
            r#"{ "names": { "settings": "getSettingsQuery" } }"#,
        )
        .unwrap();

        let config = Config {
            registry_file: Some("registry.json".to_string()),
            ..Default::default()
        };
        let registry = config.load_registry(dir.path()).unwrap();
        assert_eq!(registry.names["settings"], "getSettingsQuery");
    }

    #[test]
    fn test_load_registry_inline_wins() {
        let config = Config {
            registry_file: Some("does-not-exist.json".to_string()),
            registry: Some(RegistryConfig::default()),
            ..Default::default()
        };
        // Inline section takes priority, so the missing file is never read.
        assert!(config.load_registry(Path::new("/nowhere")).is_ok());
    }
}
