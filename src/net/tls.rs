//! TLS configuration and certificate loading.

use std::io;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the listener certificate chain and private key (both PEM).
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    // rustls needs a process-wide provider for server configs; a second install is a no-op error
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    for (what, path) in [("Certificate", &tls.cert_path), ("Private key", &tls.key_path)] {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} file not found: {}", what, path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}
