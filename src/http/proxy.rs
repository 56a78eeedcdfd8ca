//! Proxy middleware: forwards requests matched by the rule set.
//!
//! Requests no rule matches fall through to the inner router (static files
//! or 404). Matched requests are reissued upstream with the rewritten path;
//! failures become gateway errors and are never retried.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::headers::{upstream_headers, ClientInfo};
use crate::http::request::request_id;
use crate::http::response::{client_response, ProxyError};
use crate::http::server::AppState;
use crate::http::websocket;
use crate::observability::metrics;

pub async fn proxy_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let rules = state.rules.clone();
    let Some(forward) = rules.resolve(request.uri()) else {
        return next.run(request).await;
    };

    let start_time = Instant::now();
    let rule = forward.rule;
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let method_str = method.to_string();

    let upstream_uri = match forward.upstream_uri() {
        Ok(uri) => uri,
        Err(e) => {
            let err = ProxyError::from(e);
            tracing::error!(
                request_id = %request_id,
                rule = rule.prefix(),
                rewritten_path = %forward.rewritten_path,
                error = %err,
                "Cannot build upstream URI"
            );
            return fail(err, &method_str, rule.prefix(), start_time);
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        rule = rule.prefix(),
        upstream = %upstream_uri,
        "Proxying request"
    );

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let upgrade = websocket::upgrade_protocol(request.headers()).filter(|_| rule.ws());
    let client_upgrade = upgrade.as_ref().map(|_| hyper::upgrade::on(&mut request));

    let (parts, body) = request.into_parts();
    let original_host = parts.headers.get(HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    });
    let client = ClientInfo {
        peer,
        scheme: state.scheme,
    };

    // Upstream always speaks HTTP/1.1, whatever the client used.
    let mut upstream_request = Request::new(body);
    *upstream_request.method_mut() = method;
    *upstream_request.uri_mut() = upstream_uri;
    *upstream_request.headers_mut() = upstream_headers(
        &parts.headers,
        original_host.as_ref(),
        rule,
        upgrade.as_ref(),
        &client,
    );

    let outcome =
        tokio::time::timeout(state.request_timeout, state.client.request(upstream_request)).await;

    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let err = ProxyError::from(e);
            tracing::error!(request_id = %request_id, rule = rule.prefix(), error = %err, "Upstream error");
            return fail(err, &method_str, rule.prefix(), start_time);
        }
        Err(_) => {
            let err = ProxyError::Timeout(state.request_timeout);
            tracing::warn!(request_id = %request_id, rule = rule.prefix(), error = %err, "Upstream timeout");
            return fail(err, &method_str, rule.prefix(), start_time);
        }
    };

    let status = response.status();
    if status == StatusCode::SWITCHING_PROTOCOLS {
        if let Some(client_upgrade) = client_upgrade {
            let upstream_upgrade = hyper::upgrade::on(&mut response);
            websocket::spawn_tunnel(
                client_upgrade,
                upstream_upgrade,
                request_id.clone(),
                rule.prefix().to_string(),
            );
        }
    }

    metrics::record_request(&method_str, status.as_u16(), rule.prefix(), start_time);
    tracing::debug!(
        request_id = %request_id,
        status = %status,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Upstream responded"
    );

    client_response(response)
}

fn fail(err: ProxyError, method: &str, rule: &str, start_time: Instant) -> Response {
    metrics::record_upstream_error(rule, err.kind());
    metrics::record_request(method, err.status().as_u16(), rule, start_time);
    err.into_response()
}
