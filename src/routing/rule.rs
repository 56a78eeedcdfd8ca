//! A single compiled proxy rule.
//!
//! # Path composition
//! ```text
//! request path  /api/ping
//!   → rewrite   ^/api → ""          rewritten path  /ping
//!   → join      target path /api    upstream path   /api/ping
//! ```
//! With `prepend_path = false` the target path is skipped and the upstream
//! path is the rewritten path. Runs of `/` are collapsed and an empty result
//! becomes `/`.

use axum::http::uri::{Authority, InvalidUri};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use url::Url;

use crate::config::ProxyRuleConfig;
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::rewrite::PathRewrite;

/// Error compiling a proxy rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("proxy prefix {prefix:?} must start with '/'")]
    InvalidPrefix { prefix: String },

    #[error("proxy prefix {prefix:?} is declared more than once")]
    DuplicatePrefix { prefix: String },

    #[error("proxy {prefix:?}: invalid target {target:?}: {source}")]
    InvalidTarget {
        prefix: String,
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("proxy {prefix:?}: unsupported target scheme {scheme:?}, only http is supported")]
    UnsupportedScheme { prefix: String, scheme: String },

    #[error("proxy {prefix:?}: target {target:?} has no host")]
    MissingHost { prefix: String, target: String },

    #[error("proxy {prefix:?}: target {target:?} must not carry a query or fragment")]
    TargetQuery { prefix: String, target: String },

    #[error("proxy {prefix:?}: invalid path rewrite {pattern:?}: {source}")]
    InvalidRewrite {
        prefix: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("proxy {prefix:?}: invalid header {name:?}")]
    InvalidHeader { prefix: String, name: String },
}

/// A proxy rule ready to serve requests.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    matcher: PathPrefixMatcher,
    target: Url,
    authority: Authority,
    host_header: HeaderValue,
    rewrite: PathRewrite,
    headers: HeaderMap,
    change_origin: bool,
    prepend_path: bool,
    ws: bool,
    xfwd: bool,
}

impl ProxyRule {
    /// Compile a rule, reporting every problem with it.
    pub fn compile(prefix: &str, config: &ProxyRuleConfig) -> Result<Self, Vec<RuleError>> {
        let mut errors = Vec::new();

        if !prefix.starts_with('/') {
            errors.push(RuleError::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }

        let target = parse_target(prefix, &config.target).map_err(|e| errors.push(e)).ok();

        let rewrite = PathRewrite::compile(&config.path_rewrite)
            .map_err(|failures| {
                errors.extend(failures.into_iter().map(|(pattern, source)| {
                    RuleError::InvalidRewrite {
                        prefix: prefix.to_string(),
                        pattern,
                        source,
                    }
                }))
            })
            .ok();

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => errors.push(RuleError::InvalidHeader {
                    prefix: prefix.to_string(),
                    name: name.clone(),
                }),
            }
        }

        match (target, rewrite) {
            (Some((target, authority)), Some(rewrite)) if errors.is_empty() => {
                // Authority is already a valid header value.
                let host_header = HeaderValue::from_str(authority.as_str())
                    .map_err(|_| {
                        vec![RuleError::MissingHost {
                            prefix: prefix.to_string(),
                            target: config.target.clone(),
                        }]
                    })?;

                Ok(Self {
                    matcher: PathPrefixMatcher::new(prefix),
                    target,
                    authority,
                    host_header,
                    rewrite,
                    headers,
                    change_origin: config.change_origin,
                    prepend_path: config.prepend_path,
                    ws: config.ws,
                    xfwd: config.xfwd,
                })
            }
            _ => Err(errors),
        }
    }

    /// Returns true if the request path falls under this rule.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Apply the rule's path rewrites to the request path.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrite.apply(path).into_owned()
    }

    /// Path sent upstream for an already rewritten path.
    pub fn upstream_path(&self, rewritten: &str) -> String {
        if self.prepend_path {
            join_paths(self.target.path(), rewritten)
        } else {
            join_paths("", rewritten)
        }
    }

    /// Absolute URI of the upstream request.
    pub fn upstream_uri(&self, upstream_path: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let mut uri = format!("http://{}{}", self.authority, upstream_path);
        if let Some(query) = query {
            uri.push('?');
            uri.push_str(query);
        }
        uri.parse()
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Target `host[:port]`, the port omitted when it is the scheme default.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Host header sent upstream when `change_origin` is set.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Extra headers configured for this rule.
    pub fn extra_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn change_origin(&self) -> bool {
        self.change_origin
    }

    pub fn ws(&self) -> bool {
        self.ws
    }

    pub fn xfwd(&self) -> bool {
        self.xfwd
    }
}

fn parse_target(prefix: &str, target: &str) -> Result<(Url, Authority), RuleError> {
    let url = Url::parse(target).map_err(|source| RuleError::InvalidTarget {
        prefix: prefix.to_string(),
        target: target.to_string(),
        source,
    })?;

    if url.scheme() != "http" {
        return Err(RuleError::UnsupportedScheme {
            prefix: prefix.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(RuleError::TargetQuery {
            prefix: prefix.to_string(),
            target: target.to_string(),
        });
    }

    let missing_host = || RuleError::MissingHost {
        prefix: prefix.to_string(),
        target: target.to_string(),
    };
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(missing_host)?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let authority = authority.parse::<Authority>().map_err(|_| missing_host())?;

    Ok((url, authority))
}

/// Join path pieces with `/`, collapsing repeated slashes.
fn join_paths(base: &str, tail: &str) -> String {
    let mut joined = String::with_capacity(base.len() + tail.len() + 2);
    for piece in [base, tail] {
        if piece.is_empty() {
            continue;
        }
        joined.push('/');
        joined.push_str(piece);
    }

    let mut collapsed = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() {
        collapsed.push('/');
    }
    collapsed
}
