//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ordered::OrderedMap;

/// Proxy rules keyed by path prefix, in declaration order.
pub type ProxyTable = OrderedMap<ProxyRuleConfig>;

/// Root configuration for the dev server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DevProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Proxy rules mapping path prefixes to upstream targets.
    pub proxy: ProxyTable,

    /// Static file serving for requests no rule matches.
    pub static_files: StaticFilesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests handled concurrently (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            tls: None,
            max_concurrent_requests: 1_024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A single proxy rule. The path prefix is the key in the proxy table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyRuleConfig {
    /// Upstream base URL, e.g. "http://127.0.0.1:8123/api".
    pub target: String,

    /// Send the target's host as the Host header instead of the client's.
    #[serde(default, alias = "changeOrigin")]
    pub change_origin: bool,

    /// Regex → replacement, applied to the request path. First match wins.
    #[serde(default, alias = "pathRewrite")]
    pub path_rewrite: OrderedMap<String>,

    /// Join the target's path in front of the rewritten path.
    #[serde(default = "default_true", alias = "prependPath")]
    pub prepend_path: bool,

    /// Tunnel WebSocket upgrades.
    #[serde(default = "default_true")]
    pub ws: bool,

    /// Add X-Forwarded-* headers.
    #[serde(default)]
    pub xfwd: bool,

    /// Extra headers set on every upstream request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProxyRuleConfig {
    /// Rule forwarding to `target` with every option at its default.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            change_origin: false,
            path_rewrite: OrderedMap::new(),
            prepend_path: true,
            ws: true,
            xfwd: false,
            headers: BTreeMap::new(),
        }
    }

    /// Rule in the shape the dev server normally uses: Host rewritten and
    /// the prefix stripped before forwarding.
    pub fn strip_prefix(prefix: &str, target: impl Into<String>) -> Self {
        let mut rule = Self::new(target);
        rule.change_origin = true;
        rule.path_rewrite
            .push(format!("^{}", regex::escape(prefix)), String::new());
        rule
    }
}

fn default_true() -> bool {
    true
}

/// Static file serving for unmatched requests.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory to serve. Unmatched requests get 404 when unset.
    pub dir: Option<String>,

    /// Serve `index.html` for paths that don't exist (history-mode SPAs).
    pub spa_fallback: bool,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub request_secs: u64,

    /// Grace period for draining connections on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
