//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, concurrency limit)
//!     → proxy.rs (rule lookup; unmatched requests fall through)
//!         → headers.rs (hop-by-hop, Host, X-Forwarded-*)
//!         → upstream client (hyper)
//!         → websocket.rs (splice upgraded connections)
//!         → response.rs (transform, gateway errors)
//!     → static files / 404 for unmatched requests
//!     → Send to client
//! ```

pub mod headers;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use response::ProxyError;
pub use server::DevServer;
