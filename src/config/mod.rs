//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (main.rs)
//!     → validation.rs (semantic checks, all errors collected)
//!     → DevProxyConfig (validated, immutable)
//!     → compiled into routing::RuleSet at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All sections have defaults to allow minimal configs
//! - The proxy table keeps declaration order, which is also match precedence

pub mod loader;
pub mod ordered;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use ordered::OrderedMap;
pub use schema::{
    DevProxyConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyRuleConfig, ProxyTable,
    StaticFilesConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{compile_config, validate_config, ValidationError};
