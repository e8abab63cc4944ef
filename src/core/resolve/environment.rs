//! Resolution environment - what interpolated expressions can resolve to.
//!
//! Built once per run by scanning the configured fragment/name source files
//! for exported GraphQL constants and the shared name-registry object, then
//! overlaying the structured registry configuration (which is authoritative,
//! replacing the upstream habit of evaluating registry source code).

use std::collections::HashMap;
use std::sync::Arc;

use swc_common::SourceMap;
use swc_ecma_ast::{Expr, Lit, ObjectLit, Prop, PropName, PropOrSpread, Pat, VarDeclarator};
use swc_ecma_visit::{Visit, VisitWith};

use crate::config::RegistryConfig;
use crate::core::extract::ast::template_source;
use crate::core::extract::infer_operation;
use crate::core::parsers::source::parse_source;

/// Known values for interpolated expressions, shared by one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ResolutionEnvironment {
    /// Identifier of the name-registry object in source (`queryNames`).
    pub registry_object: String,
    /// JS identifier -> GraphQL text (fragment bodies, shared documents).
    pub fragments: HashMap<String, String>,
    /// JS identifier -> file the constant was defined in.
    pub fragment_origins: HashMap<String, String>,
    /// Registry property -> literal operation name.
    pub names: HashMap<String, String>,
}

impl ResolutionEnvironment {
    /// Build the environment from fragment-source files and the registry
    /// configuration. Files that fail to parse are skipped; the registry
    /// config overlays anything scanned from source.
    pub fn build(files: &[(String, String)], registry: &RegistryConfig) -> Self {
        let mut env = ResolutionEnvironment {
            registry_object: registry.registry_object.clone(),
            fragments: HashMap::new(),
            fragment_origins: HashMap::new(),
            names: HashMap::new(),
        };

        for (file_path, content) in files {
            let source_map = Arc::new(SourceMap::default());
            let Ok(parsed) = parse_source(content.clone(), file_path, source_map) else {
                continue;
            };
            let mut collector = EnvironmentCollector {
                file_path,
                source_map: &parsed.source_map,
                registry_object: &env.registry_object,
                fragments: &mut env.fragments,
                fragment_origins: &mut env.fragment_origins,
                names: &mut env.names,
            };
            parsed.module.visit_with(&mut collector);
        }

        // Structured configuration wins over scanned source.
        for (property, name) in &registry.names {
            env.names.insert(property.clone(), name.clone());
        }
        for (property, binding) in &registry.properties {
            if let Some(entry) = registry.patterns.get(&binding.pattern_key) {
                if let Some(name) = entry.names.get(&binding.version) {
                    env.names.insert(property.clone(), name.clone());
                }
            }
        }

        env
    }
}

struct EnvironmentCollector<'a> {
    file_path: &'a str,
    source_map: &'a SourceMap,
    registry_object: &'a str,
    fragments: &'a mut HashMap<String, String>,
    fragment_origins: &'a mut HashMap<String, String>,
    names: &'a mut HashMap<String, String>,
}

impl EnvironmentCollector<'_> {
    fn record_fragment(&mut self, ident: &str, text: String) {
        // Only GraphQL-looking constants participate in resolution; anything
        // else stays verbatim in the templates that reference it.
        if infer_operation(&text).is_some() && !self.fragments.contains_key(ident) {
            self.fragments.insert(ident.to_string(), text);
            self.fragment_origins
                .insert(ident.to_string(), self.file_path.to_string());
        }
    }

    fn record_registry(&mut self, object: &ObjectLit) {
        for prop in &object.props {
            let PropOrSpread::Prop(prop) = prop else {
                continue;
            };
            let Prop::KeyValue(kv) = &**prop else {
                continue;
            };
            let key = match &kv.key {
                PropName::Ident(ident) => ident.sym.to_string(),
                PropName::Str(s) => match s.value.as_str() {
                    Some(text) => text.to_string(),
                    None => continue,
                },
                _ => continue,
            };
            if let Expr::Lit(Lit::Str(value)) = &*kv.value {
                if let Some(text) = value.value.as_str() {
                    self.names.entry(key).or_insert_with(|| text.to_string());
                }
            }
        }
    }
}

/// Peel TS-only wrappers (`as const`, assertions, parens) off an initializer.
fn unwrap_expr(expr: &Expr) -> &Expr {
    match expr {
        Expr::TsAs(e) => unwrap_expr(&e.expr),
        Expr::TsConstAssertion(e) => unwrap_expr(&e.expr),
        Expr::TsNonNull(e) => unwrap_expr(&e.expr),
        Expr::Paren(e) => unwrap_expr(&e.expr),
        other => other,
    }
}

impl Visit for EnvironmentCollector<'_> {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(init)) = (&node.name, node.init.as_deref()) {
            let ident = binding.id.sym.to_string();
            match unwrap_expr(init) {
                Expr::TaggedTpl(tagged) => {
                    let text = template_source(&tagged.tpl, self.source_map);
                    self.record_fragment(&ident, text);
                }
                Expr::Tpl(tpl) => {
                    let text = template_source(tpl, self.source_map);
                    self.record_fragment(&ident, text);
                }
                Expr::Lit(Lit::Str(s)) => {
                    if let Some(text) = s.value.as_str() {
                        self.record_fragment(&ident, text.to_string());
                    }
                }
                Expr::Object(object) if ident == self.registry_object => {
                    self.record_registry(object);
                }
                _ => {}
            }
        }
        node.visit_children_with(self);
    }
}
