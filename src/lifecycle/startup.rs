//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and start the metrics exporter
//! - Build the gateway and bind its listener
//! - Print the startup banner
//! - Serve until a shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::http::{Gateway, GatewayServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::{self, BoundListener, ListenerError};
use crate::observability::metrics;
use crate::proxy::UpstreamError;

/// Errors that stop the gateway from starting.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("cannot set up upstream connector: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("cannot start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the gateway described by `config` and serve until Ctrl-C / SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), GatewayError> {
    validate_config(&config).map_err(ConfigError::from)?;

    if config.observability.metrics_enabled {
        // validated above
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr)?;
        }
    }

    let server = GatewayServer::new(&config)?;
    let bound = net::bind(&config.listener).await?;
    log_banner(&config, server.gateway(), &bound);

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let signal_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        }
    });

    let served = match bound {
        BoundListener::Tcp(listener) => server.run(listener, receiver).await,
        BoundListener::Tls { addr, config } => server.run_tls(addr, config, receiver).await,
        BoundListener::Unix { listener, path } => {
            let result = server.run_unix(listener, receiver).await;
            let _ = std::fs::remove_file(&path);
            result
        }
    };
    signal_task.abort();
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log what the gateway serves: listener, modes, static root, hosts and policies.
pub fn log_banner(config: &GatewayConfig, gateway: &Gateway, bound: &BoundListener) {
    for line in banner_lines(config, gateway, &bound.describe()) {
        tracing::info!("{}", line);
    }
}

fn banner_lines(config: &GatewayConfig, gateway: &Gateway, listening: &str) -> Vec<String> {
    let mut lines = vec![format!("Hosting server on {}", listening)];

    if let Some(tls) = &config.listener.tls {
        lines.push(format!("    TLS cert: {}", tls.cert_path.display()));
        lines.push(format!("    TLS key: {}", tls.key_path.display()));
    }
    if config.force_local {
        lines.push("    Force local source info".to_string());
    }
    if config.proxy_only {
        lines.push("    Proxy only".to_string());
    }

    let routes = gateway.routes();
    if routes.default_host().is_none() && !config.proxy_only {
        match gateway.files() {
            Some(files) => {
                lines.push("    File server".to_string());
                lines.push(format!("        Root: {}", files.root().display()));
                for (ext, mime) in gateway.mime_overrides() {
                    lines.push(format!("        MIME: {} => {}", ext, mime));
                }
            }
            None => lines.push("    File server disabled (no document root)".to_string()),
        }
    }

    if !routes.is_empty() {
        let invisible = if config.invisible { " (invisible proxy)" } else { "" };
        lines.push(format!("    Proxy server{}", invisible));
        for (host, rules) in routes.hosts() {
            if routes.default_host() == Some(host) {
                lines.push(format!("        [DEFAULT] {}", host));
            } else {
                lines.push(format!("        {}", host));
            }
            for rule in rules {
                lines.push(format!("            DEST: {} => {}", rule.src_path, rule.upstream));
            }
            for file in gateway.policy_files().iter().filter(|f| f.host == host) {
                lines.push(format!(
                    "            {}: {}",
                    file.kind.to_ascii_uppercase(),
                    file.path.display()
                ));
            }
        }
    }

    lines
}
