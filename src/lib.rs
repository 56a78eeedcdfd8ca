//! Development server that forwards configured path prefixes to a local
//! backend and serves everything else from a static directory.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::DevProxyConfig;
pub use http::DevServer;
pub use lifecycle::Shutdown;
pub use routing::RuleSet;
