//! Listener binding.
//!
//! # Responsibilities
//! - Bind the configured TCP address or Unix socket
//! - Resolve the address an HTTPS server should bind
//! - Clear a stale Unix socket file left by an earlier run

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::{TcpListener, UnixListener};

use crate::config::ListenerConfig;
use crate::net::tls::load_tls_config;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` does not resolve to a socket address")]
    Resolve(String),

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] std::io::Error),
}

/// A listener ready to be served.
pub enum BoundListener {
    Tcp(TcpListener),
    /// Bound by `axum-server` when served.
    Tls { addr: SocketAddr, config: RustlsConfig },
    Unix { listener: UnixListener, path: PathBuf },
}

impl BoundListener {
    /// Human-readable bind description for the startup banner.
    pub fn describe(&self) -> String {
        match self {
            BoundListener::Tcp(listener) => listener
                .local_addr()
                .map(|addr| format!("http://{}", addr))
                .unwrap_or_else(|_| "http://<unknown>".to_string()),
            BoundListener::Tls { addr, .. } => format!("https://{}", addr),
            BoundListener::Unix { path, .. } => format!("unix:{}", path.display()),
        }
    }
}

/// Bind according to `config`: Unix socket, else TLS, else plain TCP.
pub async fn bind(config: &ListenerConfig) -> Result<BoundListener, ListenerError> {
    if let Some(path) = &config.unix {
        let listener = bind_unix(path)?;
        tracing::info!(socket = %path.display(), "Listener bound");
        return Ok(BoundListener::Unix {
            listener,
            path: path.clone(),
        });
    }

    let address = config.bind_address();
    if let Some(tls) = &config.tls {
        let addr = tokio::net::lookup_host(&address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ListenerError::Resolve(address.clone()))?;
        let config = load_tls_config(tls).await.map_err(ListenerError::Tls)?;
        tracing::info!(address = %addr, cert = %tls.cert_path.display(), "TLS listener resolved");
        return Ok(BoundListener::Tls { addr, config });
    }

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "Listener bound");
    }
    Ok(BoundListener::Tcp(listener))
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        tracing::debug!(socket = %path.display(), "Removing stale socket file");
        let _ = std::fs::remove_file(path);
    }
    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        address: path.display().to_string(),
        source,
    })
}
