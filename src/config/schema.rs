//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Where the gateway listens (TCP, TLS or Unix socket).
    pub listener: ListenerConfig,

    /// Root directory for the static fallback; `None` disables it.
    pub document_root: Option<PathBuf>,

    /// Answer unregistered hosts with 502 instead of serving files.
    pub proxy_only: bool,

    /// Do not add X-Forwarded-* / X-Real-* headers upstream.
    pub invisible: bool,

    /// Log the socket peer even when X-Real-Ip is supplied.
    pub force_local: bool,

    /// Verify upstream TLS certificates.
    pub ssl_check: bool,

    /// Rule URIs (`proxy:`, `mime:`, `cors:`, `csp:`).
    pub rules: Vec<String>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Directory relative rule paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            document_root: None,
            proxy_only: false,
            invisible: false,
            force_local: false,
            ssl_check: true,
            rules: Vec::new(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host.
    pub host: String,

    /// Bind port; defaults to 80, or 443 with TLS.
    pub port: Option<u16>,

    /// Listen on a Unix domain socket instead of TCP.
    pub unix: Option<PathBuf>,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            unix: None,
            tls: None,
        }
    }
}

impl ListenerConfig {
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.tls.is_some() { 443 } else { 80 })
    }

    /// `host:port` for TCP binds.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.effective_port())
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Timeout configuration for upstream work.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds; 0 disables it.
    pub connect_secs: u64,

    /// Upper bound on draining an abandoned upstream body, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            drain_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
