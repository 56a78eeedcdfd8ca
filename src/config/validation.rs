//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every proxy rule once so bad targets and regexes fail at startup
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DevProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::DevProxyConfig;
use crate::routing::{RuleError, RuleSet};

/// A single semantic problem in a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} {value:?}: expected host:port")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("listener.tls requires both cert_path and key_path")]
    IncompleteTls,

    #[error("static_files.spa_fallback requires static_files.dir")]
    SpaWithoutDir,

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &DevProxyConfig) -> Result<(), Vec<ValidationError>> {
    compile_config(config).map(|_| ())
}

/// Validate a configuration and return its compiled rule set.
pub fn compile_config(config: &DevProxyConfig) -> Result<RuleSet, Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_concurrent_requests",
        });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.connect_secs",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }

    if config.static_files.spa_fallback && config.static_files.dir.is_none() {
        errors.push(ValidationError::SpaWithoutDir);
    }

    match RuleSet::from_config(&config.proxy) {
        Ok(rules) if errors.is_empty() => Ok(rules),
        Ok(_) => Err(errors),
        Err(rule_errors) => {
            errors.extend(rule_errors.into_iter().map(ValidationError::Rule));
            Err(errors)
        }
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
