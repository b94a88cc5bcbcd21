//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (drain timeout > 0, known log level)
//! - Detect conflicting listener settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Rule URIs are not validated here; bad rules are logged and skipped

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener cannot use both a Unix socket and TLS")]
    UnixWithTls,

    #[error("TLS {field} path is empty")]
    EmptyTlsPath { field: &'static str },

    #[error("document_root {0} is not a directory")]
    DocumentRootNotDirectory(String),

    #[error("timeouts.drain_secs must be greater than zero")]
    ZeroDrainTimeout,

    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),

    #[error("metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check `config` and report every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(tls) = &config.listener.tls {
        if config.listener.unix.is_some() {
            errors.push(ValidationError::UnixWithTls);
        }
        if tls.cert_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath { field: "cert" });
        }
        if tls.key_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath { field: "key" });
        }
    }

    if let Some(root) = &config.document_root {
        if !root.is_dir() {
            errors.push(ValidationError::DocumentRootNotDirectory(
                root.display().to_string(),
            ));
        }
    }

    if config.timeouts.drain_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
