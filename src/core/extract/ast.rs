//! Structural (AST) strategy.
//!
//! Parses the file with swc and walks tagged-template and call-expression
//! nodes. Higher fidelity than the pluck scan: it knows the enclosing
//! function/class, export status, and the exact template span, so its results
//! replace pluck results for any file it can fully parse.

use std::sync::Arc;

use anyhow::Result;
use swc_common::{SourceMap, SourceMapper, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, ClassDecl, ClassMethod, Expr, ExportDecl, ExportDefaultDecl,
    ExportDefaultExpr, FnDecl, Lit, MemberProp, Pat, PropName, TaggedTpl, Tpl, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith};

use crate::core::extract::query::{ExtractedQuery, QueryMetadata, SourceLocation};
use crate::core::extract::infer_operation;
use crate::core::parsers::source::parse_source;
use crate::utils::has_interpolation;

const GRAPHQL_TAGS: &[&str] = &["gql", "graphql", "GraphQL"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AstStrategy;

impl AstStrategy {
    pub fn can_handle(&self, file_path: &str) -> bool {
        matches!(
            std::path::Path::new(file_path)
                .extension()
                .and_then(|e| e.to_str()),
            Some("ts" | "tsx" | "js" | "jsx")
        )
    }

    /// Extract with a real parse error surfaced to the caller, so the
    /// orchestrator can record it before falling back to the pluck results.
    pub fn try_extract(&self, file_path: &str, content: &str) -> Result<Vec<ExtractedQuery>> {
        let source_map = Arc::new(SourceMap::default());
        let parsed = parse_source(content.to_string(), file_path, source_map)?;

        let mut collector = QueryCollector {
            file_path,
            source_map: &parsed.source_map,
            fn_stack: Vec::new(),
            class_stack: Vec::new(),
            export_depth: 0,
            queries: Vec::new(),
        };
        parsed.module.visit_with(&mut collector);
        Ok(collector.queries)
    }

    pub fn extract(&self, file_path: &str, content: &str) -> Vec<ExtractedQuery> {
        self.try_extract(file_path, content).unwrap_or_default()
    }
}

/// AST visitor collecting GraphQL templates plus their source context.
struct QueryCollector<'a> {
    file_path: &'a str,
    source_map: &'a SourceMap,
    /// Enclosing function names (innermost last).
    fn_stack: Vec<String>,
    /// Enclosing class names (innermost last).
    class_stack: Vec<String>,
    /// Non-zero while visiting the subtree of an export declaration.
    export_depth: usize,
    queries: Vec<ExtractedQuery>,
}

impl QueryCollector<'_> {
    fn record(&mut self, body: String, tag: Option<String>, span: swc_common::Span) {
        let Some((operation_type, name)) = infer_operation(&body) else {
            return;
        };

        let loc = self.source_map.lookup_char_pos(span.lo);
        let index = self.queries.len();
        let needs_resolution = has_interpolation(&body);
        self.queries.push(ExtractedQuery {
            id: ExtractedQuery::make_id(self.file_path, index),
            file_path: self.file_path.to_string(),
            content: body,
            operation_type,
            name,
            location: SourceLocation::new(loc.line, loc.col_display),
            needs_resolution,
            metadata: QueryMetadata {
                enclosing_function: self.fn_stack.last().cloned(),
                enclosing_class: self.class_stack.last().cloned(),
                exported: self.export_depth > 0,
                tag,
                pattern: None,
            },
        });
    }

    fn template_text(&self, tpl: &Tpl) -> String {
        template_source(tpl, self.source_map)
    }
}

/// Reconstruct a template literal's text: quasi runs interleaved with the
/// original source text of each interpolated expression.
pub(crate) fn template_source(tpl: &Tpl, source_map: &SourceMap) -> String {
    let mut text = String::new();
    for (i, quasi) in tpl.quasis.iter().enumerate() {
        text.push_str(quasi.raw.as_ref());
        if let Some(expr) = tpl.exprs.get(i) {
            text.push_str("${");
            let source = source_map
                .span_to_snippet(expr.span())
                .unwrap_or_else(|_| expr_source_fallback(expr));
            text.push_str(&source);
            text.push('}');
        }
    }
    text
}

/// Best-effort rendering of an interpolated expression when the snippet
/// cannot be recovered from the source map.
fn expr_source_fallback(expr: &Expr) -> String {
    match expr {
        Expr::Ident(ident) => ident.sym.to_string(),
        Expr::Member(member) => {
            let obj = expr_source_fallback(&member.obj);
            match &member.prop {
                MemberProp::Ident(prop) => format!("{}.{}", obj, prop.sym),
                _ => obj,
            }
        }
        Expr::Lit(Lit::Str(s)) => match s.value.as_str() {
            Some(text) => format!("'{}'", text),
            None => "''".to_string(),
        },
        Expr::Cond(cond) => format!(
            "{} ? {} : {}",
            expr_source_fallback(&cond.test),
            expr_source_fallback(&cond.cons),
            expr_source_fallback(&cond.alt)
        ),
        _ => "unresolved".to_string(),
    }
}

fn tag_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Member(member) => {
            let obj = tag_name(&member.obj)?;
            match &member.prop {
                MemberProp::Ident(prop) => Some(format!("{}.{}", obj, prop.sym)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_graphql_tag(tag: &str) -> bool {
    let head = tag.split('.').next().unwrap_or(tag);
    GRAPHQL_TAGS.contains(&head)
}

impl Visit for QueryCollector<'_> {
    fn visit_tagged_tpl(&mut self, node: &TaggedTpl) {
        if let Some(tag) = tag_name(&node.tag) {
            if is_graphql_tag(&tag) {
                let body = self.template_text(&node.tpl);
                self.record(body, Some(tag), node.span);
            }
        }
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &CallExpr) {
        // Call form: gql(`...`) or graphql("...")
        if let Callee::Expr(callee) = &node.callee {
            if let Some(tag) = tag_name(callee) {
                if is_graphql_tag(&tag) {
                    if let Some(arg) = node.args.first() {
                        match &*arg.expr {
                            Expr::Tpl(tpl) => {
                                let body = self.template_text(tpl);
                                self.record(body, Some(tag), node.span);
                            }
                            Expr::Lit(Lit::Str(s)) => {
                                if let Some(text) = s.value.as_str() {
                                    self.record(text.to_string(), Some(tag), node.span);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        node.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.fn_stack.push(node.ident.sym.to_string());
        node.visit_children_with(self);
        self.fn_stack.pop();
    }

    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.class_stack.push(node.ident.sym.to_string());
        node.visit_children_with(self);
        self.class_stack.pop();
    }

    fn visit_class_method(&mut self, node: &ClassMethod) {
        let pushed = if let PropName::Ident(name) = &node.key {
            self.fn_stack.push(name.sym.to_string());
            true
        } else {
            false
        };
        node.visit_children_with(self);
        if pushed {
            self.fn_stack.pop();
        }
    }

    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        // `const useVenture = () => gql`...`` reads as an enclosing function.
        let is_fn_init = matches!(
            node.init.as_deref(),
            Some(Expr::Arrow(_)) | Some(Expr::Fn(_))
        );
        let pushed = if is_fn_init {
            if let Pat::Ident(binding) = &node.name {
                self.fn_stack.push(binding.id.sym.to_string());
                true
            } else {
                false
            }
        } else {
            false
        };
        node.visit_children_with(self);
        if pushed {
            self.fn_stack.pop();
        }
    }

    fn visit_export_decl(&mut self, node: &ExportDecl) {
        self.export_depth += 1;
        node.visit_children_with(self);
        self.export_depth -= 1;
    }

    fn visit_export_default_decl(&mut self, node: &ExportDefaultDecl) {
        self.export_depth += 1;
        node.visit_children_with(self);
        self.export_depth -= 1;
    }

    fn visit_export_default_expr(&mut self, node: &ExportDefaultExpr) {
        self.export_depth += 1;
        node.visit_children_with(self);
        self.export_depth -= 1;
    }
}
