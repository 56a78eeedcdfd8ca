//! Rule lookup.
//!
//! # Responsibilities
//! - Store compiled rules in declaration order
//! - Look up the rule for a request and plan the upstream request
//! - Return an explicit `None` for requests the proxy does not intercept
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (rule tables are a handful of entries)

use axum::http::uri::InvalidUri;
use axum::http::Uri;

use crate::config::ProxyTable;
use crate::routing::rule::{ProxyRule, RuleError};

/// The compiled dev proxy rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ProxyRule>,
}

/// A matched request: which rule applies and where it goes upstream.
#[derive(Debug, Clone)]
pub struct Forward<'a> {
    pub rule: &'a ProxyRule,
    /// Request path after the rule's path rewrite.
    pub rewritten_path: String,
    /// Path requested from the upstream.
    pub upstream_path: String,
    /// Original query string, forwarded verbatim.
    pub query: Option<String>,
}

impl Forward<'_> {
    /// Absolute upstream URI, including the query string.
    pub fn upstream_uri(&self) -> Result<Uri, InvalidUri> {
        self.rule.upstream_uri(&self.upstream_path, self.query.as_deref())
    }
}

impl RuleSet {
    /// Compile every rule of the proxy table, collecting all errors.
    pub fn from_config(table: &ProxyTable) -> Result<Self, Vec<RuleError>> {
        let mut rules = Vec::with_capacity(table.len());
        let mut errors = Vec::new();
        let mut seen: Vec<&str> = Vec::with_capacity(table.len());

        for (prefix, config) in table.iter() {
            if seen.contains(&prefix) {
                errors.push(RuleError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                });
                continue;
            }
            seen.push(prefix);

            match ProxyRule::compile(prefix, config) {
                Ok(rule) => rules.push(rule),
                Err(rule_errors) => errors.extend(rule_errors),
            }
        }

        if errors.is_empty() {
            Ok(Self { rules })
        } else {
            Err(errors)
        }
    }

    /// First rule, in declaration order, whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Plan the upstream request for `uri`, or `None` if no rule applies.
    pub fn resolve(&self, uri: &Uri) -> Option<Forward<'_>> {
        let path = uri.path();
        let rule = self.match_path(path)?;
        let rewritten_path = rule.rewrite_path(path);
        let upstream_path = rule.upstream_path(&rewritten_path);

        Some(Forward {
            rule,
            rewritten_path,
            upstream_path,
            query: uri.query().map(str::to_string),
        })
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
