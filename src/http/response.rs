//! Response handling and gateway errors.
//!
//! # Responsibilities
//! - Turn an upstream response into a client response
//! - Map forwarding failures to gateway status codes
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - Hop-by-hop headers stripped, except on 101 Switching Protocols
//! - Unreachable upstream → 502, upstream too slow → 504

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::InvalidUri;
use axum::http::{Response as HttpResponse, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;

use crate::http::headers::downstream_headers;

/// Error forwarding a request upstream.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("rewritten path is not a valid URI: {0}")]
    InvalidUri(#[from] InvalidUri),
}

impl ProxyError {
    /// Status code returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Upstream(e) if e.is_connect() => "connect",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::InvalidUri(_) => "invalid_uri",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = match &self {
            ProxyError::Upstream(_) => "Upstream request failed",
            ProxyError::Timeout(_) => "Upstream request timed out",
            ProxyError::InvalidUri(_) => "Rewritten path is not a valid URI",
        };
        (self.status(), message).into_response()
    }
}

/// Convert an upstream response into the response sent to the client.
pub fn client_response(response: HttpResponse<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    if parts.status != StatusCode::SWITCHING_PROTOCOLS {
        downstream_headers(&mut parts.headers);
    }
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_504() {
        let err = ProxyError::Timeout(Duration::from_secs(30));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_invalid_uri_maps_to_500() {
        let err = ProxyError::from("http://a b".parse::<axum::http::Uri>().unwrap_err());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
