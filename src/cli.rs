//! Command-line interface.
//!
//! Flags override values from the configuration file. Positional paths are
//! sorted by kind: a file is the configuration, a directory the document root.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, ConfigError, GatewayConfig, TlsConfig};

#[derive(Debug, Parser)]
#[command(name = "lazy-gateway")]
#[command(about = "HTTP/HTTPS gateway with per-host proxy, CORS and CSP rules", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Configuration file or document root directory.
    pub paths: Vec<PathBuf>,

    /// Bind host.
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Bind port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen on a Unix domain socket.
    #[arg(short, long)]
    pub unix: Option<PathBuf>,

    /// TLS certificate (PEM); requires --ssl-key.
    #[arg(long, requires = "ssl_key")]
    pub ssl_cert: Option<PathBuf>,

    /// TLS private key (PEM); requires --ssl-cert.
    #[arg(long, requires = "ssl_cert")]
    pub ssl_key: Option<PathBuf>,

    /// Static file root.
    #[arg(short, long)]
    pub document_root: Option<PathBuf>,

    /// Rule URI; repeatable.
    #[arg(short, long = "rule")]
    pub rules: Vec<String>,

    /// Accept any upstream TLS certificate.
    #[arg(long)]
    pub no_ssl_check: bool,

    /// Answer unregistered hosts with 502.
    #[arg(long)]
    pub proxy_only: bool,

    /// Do not add forwarding headers upstream.
    #[arg(long)]
    pub invisible: bool,

    /// Log the socket peer even when X-Real-Ip is present.
    #[arg(long)]
    pub force_local: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the configuration file (if any) and apply flags on top.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config_path = self.config.clone();
        let mut document_root = None;
        for path in &self.paths {
            if path.is_dir() {
                document_root = Some(path.clone());
            } else {
                config_path = Some(path.clone());
            }
        }

        let mut config = match &config_path {
            Some(path) => load_config(path)?,
            None => GatewayConfig::default(),
        };
        if let Some(root) = document_root {
            config.document_root = Some(root);
        }
        self.apply(&mut config);
        Ok(config)
    }

    /// Overlay flags onto `config`.
    pub fn apply(self, config: &mut GatewayConfig) {
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = Some(port);
        }
        if let Some(unix) = self.unix {
            config.listener.unix = Some(unix);
        }
        if let (Some(cert_path), Some(key_path)) = (self.ssl_cert, self.ssl_key) {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        if let Some(root) = self.document_root {
            config.document_root = Some(root);
        }
        config.rules.extend(self.rules);

        config.ssl_check &= !self.no_ssl_check;
        config.proxy_only |= self.proxy_only;
        config.invisible |= self.invisible;
        config.force_local |= self.force_local;

        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}
