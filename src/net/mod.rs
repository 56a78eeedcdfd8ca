//! Network layer subsystem.
//!
//! Plain TCP listeners are bound directly with Tokio; this module only adds
//! the optional TLS termination for the dev server.

pub mod tls;

pub use tls::load_tls_config;
