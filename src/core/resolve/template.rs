//! Template interpolation resolution.
//!
//! Turns `${...}` markers inside a raw template into literal GraphQL text
//! before parsing is attempted. Resolution is a bounded fixed-point loop:
//! an interpolation may resolve to text that itself contains further markers
//! (fragments containing fragments), so passes repeat until nothing changes
//! or the iteration cap is hit. Non-convergence is a flagged state, never an
//! error.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::resolve::environment::ResolutionEnvironment;

static EMPTY_PARENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)").expect("valid regex"));

static EMPTY_BRACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*\}").expect("valid regex"));

static EXCESS_BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// One `${...}` marker found in a template. Ephemeral: lives only for a
/// single resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInterpolation {
    /// Byte offset of the `$` in `${`.
    pub start: usize,
    /// Byte offset one past the closing `}`.
    pub end: usize,
    /// The expression text between the braces.
    pub expression: String,
    /// What the expression resolved to, once known.
    pub resolved: Option<String>,
}

/// Result of resolving one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub text: String,
    /// True when no `${` markers remain.
    pub converged: bool,
    /// Total substitutions performed across all passes.
    pub substitutions: usize,
}

pub struct TemplateResolver<'a> {
    env: &'a ResolutionEnvironment,
    prefer_true_branch: bool,
    max_iterations: usize,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(
        env: &'a ResolutionEnvironment,
        prefer_true_branch: bool,
        max_iterations: usize,
    ) -> Self {
        Self {
            env,
            prefer_true_branch,
            max_iterations,
        }
    }

    /// Resolve all markers in `content`.
    ///
    /// Content already free of `${` is returned unchanged with zero
    /// substitutions.
    pub fn resolve(&self, content: &str) -> ResolutionOutcome {
        if !content.contains("${") {
            return ResolutionOutcome {
                text: content.to_string(),
                converged: true,
                substitutions: 0,
            };
        }

        let mut text = content.to_string();
        let mut total = 0;
        for _ in 0..self.max_iterations {
            let (next, substitutions) = self.resolve_pass(&text);
            text = next;
            total += substitutions;
            if substitutions == 0 || !text.contains("${") {
                break;
            }
        }

        let converged = !text.contains("${");
        if total > 0 {
            text = cleanup(&text);
        }
        ResolutionOutcome {
            text,
            converged,
            substitutions: total,
        }
    }

    /// One pass: substitute every marker that resolves, in reverse position
    /// order so earlier offsets stay valid.
    fn resolve_pass(&self, content: &str) -> (String, usize) {
        let mut markers = find_interpolations(content);
        for marker in &mut markers {
            marker.resolved = self.resolve_expression(marker.expression.trim());
        }

        let mut text = content.to_string();
        let mut substitutions = 0;
        for marker in markers.iter().rev() {
            if let Some(value) = &marker.resolved {
                text.replace_range(marker.start..marker.end, value);
                substitutions += 1;
            }
        }

        (text, substitutions)
    }

    /// Direct resolution strategies, in priority order:
    /// registry member access, ternary with known branches, bare fragment
    /// identifier. Anything else stays verbatim (`None`).
    fn resolve_expression(&self, expression: &str) -> Option<String> {
        if let Some(property) = expression
            .strip_prefix(self.env.registry_object.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        {
            if is_identifier(property) {
                return self.env.names.get(property).cloned();
            }
        }

        if let Some((_test, consequent, alternate)) = split_ternary(expression) {
            let (first, second) = if self.prefer_true_branch {
                (consequent, alternate)
            } else {
                (alternate, consequent)
            };
            return self
                .resolve_branch(first)
                .or_else(|| self.resolve_branch(second));
        }

        if is_identifier(expression) {
            return self.env.fragments.get(expression).cloned();
        }

        None
    }

    fn resolve_branch(&self, branch: &str) -> Option<String> {
        let branch = branch.trim();
        if let Some(literal) = strip_quotes(branch) {
            return Some(literal.to_string());
        }
        if is_identifier(branch) {
            return self.env.fragments.get(branch).cloned();
        }
        if let Some(property) = branch
            .strip_prefix(self.env.registry_object.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        {
            if is_identifier(property) {
                return self.env.names.get(property).cloned();
            }
        }
        None
    }
}

/// Find every `${...}` marker, tracking nested braces so expressions that
/// contain object literals or blocks are captured whole.
pub fn find_interpolations(content: &str) -> Vec<TemplateInterpolation> {
    let bytes = content.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            let start = i;
            let mut depth = 1usize;
            let mut j = i + 2;
            while j < bytes.len() && depth > 0 {
                match bytes[j] {
                    b'{' => depth += 1,
                    b'}' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            if depth == 0 {
                markers.push(TemplateInterpolation {
                    start,
                    end: j,
                    expression: content[start + 2..j - 1].to_string(),
                    resolved: None,
                });
                i = j;
                continue;
            }
            // Unterminated marker: nothing further can close it.
            break;
        }
        i += 1;
    }

    markers
}

/// Split `test ? consequent : alternate`, honoring nested ternaries in the
/// alternate position.
fn split_ternary(expression: &str) -> Option<(&str, &str, &str)> {
    let question = expression.find('?')?;
    let (test, rest) = expression.split_at(question);
    let rest = &rest[1..];

    let mut depth = 0usize;
    for (idx, c) in rest.char_indices() {
        match c {
            '?' => depth += 1,
            ':' if depth == 0 => {
                return Some((test.trim(), rest[..idx].trim(), rest[idx + 1..].trim()));
            }
            ':' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn strip_quotes(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' && last == b'\'')
            || (first == b'"' && last == b'"')
            || (first == b'`' && last == b'`')
        {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
}

/// Best-effort repair of degenerate patterns left behind by partial
/// resolution: empty parens, empty selection sets, unbalanced braces.
pub fn cleanup(text: &str) -> String {
    let mut text = EMPTY_PARENS_RE.replace_all(text, "").into_owned();

    // Empty selection sets can nest after removal, so iterate to a fixed
    // point (bounded by input size).
    loop {
        let next = EMPTY_BRACES_RE.replace_all(&text, "").into_owned();
        if next == text {
            break;
        }
        text = next;
    }

    let open = text.bytes().filter(|&b| b == b'{').count();
    let close = text.bytes().filter(|&b| b == b'}').count();
    if open > close {
        for _ in 0..open - close {
            text.push_str("\n}");
        }
    } else if close > open {
        let mut excess = close - open;
        while excess > 0 {
            let trimmed = text.trim_end();
            if let Some(stripped) = trimmed.strip_suffix('}') {
                text = stripped.to_string();
                excess -= 1;
            } else {
                break;
            }
        }
    }

    EXCESS_BLANK_LINES_RE.replace_all(&text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use std::collections::HashMap;

    fn env() -> ResolutionEnvironment {
        let mut fragments = HashMap::new();
        fragments.insert(
            "ventureFragment".to_string(),
            "fragment ventureFields on Venture { id name }".to_string(),
        );
        fragments.insert(
            "outerFragment".to_string(),
            "fragment outer on Venture { ...inner }\n${innerFragment}".to_string(),
        );
        fragments.insert(
            "innerFragment".to_string(),
            "fragment inner on Venture { id }".to_string(),
        );

        let mut names = HashMap::new();
        names.insert("byIdV1".to_string(), "getVentureByIdV1".to_string());

        ResolutionEnvironment {
            registry_object: "queryNames".to_string(),
            fragments,
            names,
            ..Default::default()
        }
    }

    fn resolver(env: &ResolutionEnvironment) -> TemplateResolver<'_> {
        TemplateResolver::new(env, true, 10)
    }

    #[test]
    fn test_idempotent_on_literal_content() {
        let env = env();
        let content = "query GetVenture { venture { id } }";
        let outcome = resolver(&env).resolve(content);
        assert_eq!(outcome.text, content);
        assert_eq!(outcome.substitutions, 0);
        assert!(outcome.converged);
    }

    #[test]
    fn test_registry_member_access() {
        let env = env();
        let outcome =
            resolver(&env).resolve("query ${queryNames.byIdV1} { venture { id } }");
        assert_eq!(outcome.text, "query getVentureByIdV1 { venture { id } }");
        assert!(outcome.converged);
    }

    #[test]
    fn test_bare_fragment_identifier() {
        let env = env();
        let outcome = resolver(&env).resolve("query Q { venture { id } }\n${ventureFragment}");
        assert!(outcome.text.contains("fragment ventureFields on Venture"));
        assert!(outcome.converged);
    }

    #[test]
    fn test_nested_fragment_resolution_fixed_point() {
        let env = env();
        let outcome = resolver(&env).resolve("query Q { v { ...outer } }\n${outerFragment}");
        // outerFragment itself interpolates innerFragment; a second pass
        // resolves it.
        assert!(outcome.text.contains("fragment inner on Venture"));
        assert!(outcome.converged);
        assert_eq!(outcome.substitutions, 2);
    }

    #[test]
    fn test_ternary_prefers_true_branch() {
        let env = env();
        let outcome =
            resolver(&env).resolve("query Q { v { ...${flag ? 'fragA' : 'fragB'} } }");
        assert_eq!(outcome.text, "query Q { v { ...fragA } }");
    }

    #[test]
    fn test_ternary_prefers_false_branch_when_configured() {
        let env = env();
        let resolver = TemplateResolver::new(&env, false, 10);
        let outcome = resolver.resolve("query Q { v { ...${flag ? 'fragA' : 'fragB'} } }");
        assert_eq!(outcome.text, "query Q { v { ...fragB } }");
    }

    #[test]
    fn test_ternary_falls_back_to_known_branch() {
        let env = env();
        let outcome = resolver(&env)
            .resolve("query Q { v { id } }\n${flag ? unknownIdent : ventureFragment}");
        assert!(outcome.text.contains("fragment ventureFields"));
    }

    #[test]
    fn test_unknown_expression_kept_verbatim() {
        let env = env();
        let content = "query Q { v(id: ${props.id}) { id } }";
        let outcome = resolver(&env).resolve(content);
        assert_eq!(outcome.text, content);
        assert!(!outcome.converged);
        assert_eq!(outcome.substitutions, 0);
    }

    #[test]
    fn test_find_interpolations_nested_braces() {
        let markers = find_interpolations("a ${cond ? {x: 1} : two} b ${three}");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].expression, "cond ? {x: 1} : two");
        assert_eq!(markers[1].expression, "three");
    }

    #[test]
    fn test_cleanup_repairs_empty_braces_and_parens() {
        assert_eq!(cleanup("query Q() { v { } x }"), "query Q { v  x }");
    }

    #[test]
    fn test_cleanup_balances_missing_brace() {
        let repaired = cleanup("query Q { v { id }");
        assert_eq!(
            repaired.bytes().filter(|&b| b == b'{').count(),
            repaired.bytes().filter(|&b| b == b'}').count()
        );
    }

    #[test]
    fn test_split_ternary_nested() {
        let (test, cons, alt) = split_ternary("a ? b : c ? d : e").unwrap();
        assert_eq!(test, "a");
        assert_eq!(cons, "b");
        assert_eq!(alt, "c ? d : e");
    }
}
