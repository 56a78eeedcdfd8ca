//! Header manipulation for forwarded requests and responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Rewrite Host when the rule asks for it (`change_origin`)
//! - Add X-Forwarded-For/-Host/-Proto/-Port (`xfwd`)
//! - Apply per-rule extra headers
//!
//! Everything else (method, end-to-end headers, body) is forwarded as is.

use std::net::SocketAddr;

use axum::http::header::{CONNECTION, HOST, UPGRADE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::routing::ProxyRule;

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PORT: &str = "x-forwarded-port";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// What the proxy knows about the client side of a request.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo {
    /// Remote address of the client connection, when known.
    pub peer: Option<SocketAddr>,
    /// Scheme the dev server listens with ("http" or "https").
    pub scheme: &'static str,
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Build the header map sent upstream for a matched request.
///
/// `original_host` is the Host the client addressed; it is kept unless the
/// rule rewrites it. `upgrade` carries the protocol of a tunnelled upgrade.
pub fn upstream_headers(
    original: &HeaderMap,
    original_host: Option<&HeaderValue>,
    rule: &ProxyRule,
    upgrade: Option<&HeaderValue>,
    client: &ClientInfo,
) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);

    if let Some(protocol) = upgrade {
        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(UPGRADE, protocol.clone());
    }

    if let Some(host) = original_host {
        headers.insert(HOST, host.clone());
    }

    if rule.xfwd() {
        add_forwarded(&mut headers, original_host, client);
    }

    for (name, value) in rule.extra_headers() {
        headers.insert(name.clone(), value.clone());
    }

    if rule.change_origin() {
        headers.insert(HOST, rule.host_header().clone());
    }

    headers
}

/// Strip hop-by-hop headers from an upstream response.
pub fn downstream_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
}

fn add_forwarded(headers: &mut HeaderMap, original_host: Option<&HeaderValue>, client: &ClientInfo) {
    if let Some(peer) = client.peer {
        append_value(headers, X_FORWARDED_FOR, &peer.ip().to_string());
    }

    let host = original_host.and_then(|h| h.to_str().ok());
    let port = host
        .and_then(|h| h.rsplit_once(':'))
        .map(|(_, port)| port)
        .filter(|port| port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(if client.scheme == "https" { "443" } else { "80" });

    append_value(headers, X_FORWARDED_PORT, port);
    append_value(headers, X_FORWARDED_PROTO, client.scheme);
    if let Some(host) = host {
        if !headers.contains_key(X_FORWARDED_HOST) {
            append_value(headers, X_FORWARDED_HOST, host);
        }
    }
}

/// Append to a comma-separated header, creating it if absent.
fn append_value(headers: &mut HeaderMap, name: &'static str, value: &str) {
    let combined = match headers.get(name).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {value}"),
        _ => value.to_string(),
    };
    if let Ok(combined) = HeaderValue::from_str(&combined) {
        headers.insert(name, combined);
    }
}
