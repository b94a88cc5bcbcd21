//! Upstream connections.
//!
//! # Responsibilities
//! - Dial an upstream over TCP, TLS or a Unix domain socket
//! - Run the HTTP/1.1 client handshake on the fresh connection
//! - Drive the connection on its own task
//!
//! # Design Decisions
//! - One connection per proxied request, never pooled or reused
//! - Header names go out title-cased (`X-Forwarded-Host`, `X-Real-Ip`)
//! - TLS uses the platform roots; `ssl_check = false` accepts any certificate
//! - SNI is the rule's destination host

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::TlsConnector;

use crate::routing::Upstream;

/// Errors raised while reaching an upstream.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("cannot connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {target} timed out after {timeout:?}")]
    ConnectTimeout { target: String, timeout: Duration },

    #[error("TLS handshake with {target} failed: {source}")]
    Tls {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` is not a valid TLS server name")]
    ServerName(String),

    #[error("TLS client setup failed: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("HTTP handshake with {target} failed: {source}")]
    Handshake {
        target: String,
        #[source]
        source: hyper::Error,
    },

    #[error("upstream request failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("cannot build upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

impl UpstreamError {
    /// Metric label for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Connect { .. } => "connect",
            UpstreamError::ConnectTimeout { .. } => "timeout",
            UpstreamError::Tls { .. } | UpstreamError::ServerName(_) | UpstreamError::TlsConfig(_) => {
                "tls"
            }
            UpstreamError::Handshake { .. } => "handshake",
            UpstreamError::Send(_) => "send",
            UpstreamError::Request(_) => "request",
        }
    }
}

/// Opens one HTTP/1.1 connection per call.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
    connect_timeout: Option<Duration>,
}

impl Connector {
    pub fn new(ssl_check: bool, connect_timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let config = client_config(ssl_check)?;
        Ok(Self {
            tls: TlsConnector::from(Arc::new(config)),
            connect_timeout,
        })
    }

    /// Dial `upstream` and hand back a request sender for the new connection.
    pub async fn open(&self, upstream: &Upstream) -> Result<SendRequest<Body>, UpstreamError> {
        let target = upstream.to_string();
        match upstream {
            Upstream::Tcp { host, port, tls } => {
                let stream = self
                    .with_timeout(&target, TcpStream::connect((host.as_str(), *port)))
                    .await?;
                // best effort; a failure only affects latency
                let _ = stream.set_nodelay(true);

                if *tls {
                    let name = ServerName::try_from(host.clone())
                        .map_err(|_| UpstreamError::ServerName(host.clone()))?;
                    let stream = self
                        .tls
                        .connect(name, stream)
                        .await
                        .map_err(|source| UpstreamError::Tls {
                            target: target.clone(),
                            source,
                        })?;
                    handshake(stream, target).await
                } else {
                    handshake(stream, target).await
                }
            }
            Upstream::Pipe { socket_path } => {
                let stream = self
                    .with_timeout(&target, UnixStream::connect(socket_path))
                    .await?;
                handshake(stream, target).await
            }
        }
    }

    async fn with_timeout<T, F>(&self, target: &str, connect: F) -> Result<T, UpstreamError>
    where
        F: std::future::Future<Output = std::io::Result<T>>,
    {
        let result = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| UpstreamError::ConnectTimeout {
                    target: target.to_string(),
                    timeout,
                })?,
            None => connect.await,
        };
        result.map_err(|source| UpstreamError::Connect {
            target: target.to_string(),
            source,
        })
    }
}

async fn handshake<IO>(io: IO, target: String) -> Result<SendRequest<Body>, UpstreamError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = http1::Builder::new()
        .title_case_headers(true)
        .handshake(TokioIo::new(io))
        .await
        .map_err(|source| UpstreamError::Handshake {
            target: target.clone(),
            source,
        })?;

    tokio::spawn(async move {
        if let Err(err) = conn.await {
            tracing::debug!(upstream = %target, error = %err, "Upstream connection closed with error");
        }
    });

    Ok(sender)
}

fn client_config(ssl_check: bool) -> Result<ClientConfig, UpstreamError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions()?;

    let mut config = if ssl_check {
        builder
            .with_root_certificates(native_roots())
            .with_no_client_auth()
    } else {
        tracing::warn!("Upstream TLS certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(error = %err, "Skipping unreadable platform certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    tracing::debug!(added, ignored, "Loaded platform root certificates");
    roots
}

/// Accepts every server certificate (`ssl_check = false`).
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
