//! Regex path rewriting.
//!
//! Rewrites are tried in declaration order; the first pattern that matches
//! replaces its first occurrence and the rest are skipped. Replacement
//! strings may reference capture groups (`$1`, `${name}`).

use std::borrow::Cow;

use regex::Regex;

use crate::config::OrderedMap;

#[derive(Debug, Clone)]
struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

/// Compiled, ordered set of path rewrites for one proxy rule.
#[derive(Debug, Clone, Default)]
pub struct PathRewrite {
    rules: Vec<RewriteRule>,
}

impl PathRewrite {
    /// Compile every pattern, returning all that fail.
    pub fn compile(table: &OrderedMap<String>) -> Result<Self, Vec<(String, regex::Error)>> {
        let mut rules = Vec::with_capacity(table.len());
        let mut failures = Vec::new();

        for (pattern, replacement) in table.iter() {
            match Regex::new(pattern) {
                Ok(pattern) => rules.push(RewriteRule {
                    pattern,
                    replacement: replacement.clone(),
                }),
                Err(e) => failures.push((pattern.to_string(), e)),
            }
        }

        if failures.is_empty() {
            Ok(Self { rules })
        } else {
            Err(failures)
        }
    }

    /// Apply the first matching rewrite to `path`.
    pub fn apply<'a>(&self, path: &'a str) -> Cow<'a, str> {
        for rule in &self.rules {
            if rule.pattern.is_match(path) {
                return rule.pattern.replace(path, rule.replacement.as_str());
            }
        }
        Cow::Borrowed(path)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(entries: &[(&str, &str)]) -> PathRewrite {
        let table: OrderedMap<String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PathRewrite::compile(&table).unwrap()
    }

    #[test]
    fn test_strip_anchored_prefix() {
        let rw = rewrite(&[("^/api", "")]);
        assert_eq!(rw.apply("/api/ping"), "/ping");
        assert_eq!(rw.apply("/api"), "");
        assert_eq!(rw.apply("/v1/api/ping"), "/v1/api/ping");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rw = rewrite(&[("^/api/v1", "/legacy"), ("^/api", "")]);
        assert_eq!(rw.apply("/api/v1/users"), "/legacy/users");
        assert_eq!(rw.apply("/api/v2/users"), "/v2/users");
    }

    #[test]
    fn test_replaces_first_occurrence_only() {
        let rw = rewrite(&[("/x", "/y")]);
        assert_eq!(rw.apply("/x/x"), "/y/x");
    }

    #[test]
    fn test_capture_groups() {
        let rw = rewrite(&[(r"^/media/(\d+)/", "/files/$1/")]);
        assert_eq!(rw.apply("/media/42/photo.png"), "/files/42/photo.png");
    }

    #[test]
    fn test_empty_rewrite_is_identity() {
        let rw = PathRewrite::default();
        assert!(rw.is_empty());
        assert!(matches!(rw.apply("/api/ping"), Cow::Borrowed("/api/ping")));
    }

    #[test]
    fn test_compile_reports_every_bad_pattern() {
        let table: OrderedMap<String> =
            [("^/a(", ""), ("^/ok", ""), ("[", "")].into_iter().map(|(k, v)| (k, v.to_string())).collect();
        let failures = PathRewrite::compile(&table).unwrap_err();
        let patterns: Vec<_> = failures.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(patterns, vec!["^/a(", "["]);
    }
}
