//! WebSocket (HTTP Upgrade) tunnelling.
//!
//! # Data Flow
//! ```text
//! Client ──Upgrade──▶ Proxy ──Upgrade──▶ Backend
//! Client ◀───101───── Proxy ◀───101───── Backend
//! Client ◀══ bytes ══▶ Proxy ◀══ bytes ══▶ Backend
//! ```
//!
//! # Design Decisions
//! - The handshake is forwarded like any other request
//! - After 101 both upgraded connections are spliced byte for byte
//! - Frames are never parsed; any Upgrade protocol works

use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::{HeaderMap, HeaderValue};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use crate::observability::metrics;

/// Protocol requested by an upgrade request (`Connection: upgrade` plus
/// an `Upgrade` header), if any.
pub fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    if wants_upgrade {
        headers.get(UPGRADE).cloned()
    } else {
        None
    }
}

/// Splice the client and upstream connections once both have upgraded.
pub fn spawn_tunnel(client: OnUpgrade, upstream: OnUpgrade, request_id: String, rule: String) {
    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client, upstream) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(request_id = %request_id, rule = %rule, error = %e, "Upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);

        metrics::tunnel_opened();
        tracing::debug!(request_id = %request_id, rule = %rule, "Tunnel established");

        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((sent, received)) => {
                tracing::debug!(request_id = %request_id, sent, received, "Tunnel closed");
            }
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "Tunnel closed with error");
            }
        }

        metrics::tunnel_closed();
    });
}
