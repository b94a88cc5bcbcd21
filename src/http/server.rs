//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the gateway state from configuration (routes, policies, files)
//! - Create the Axum router with a single catch-all handler
//! - Serve it on TCP, TLS or a Unix socket with graceful shutdown
//! - Dispatch each request: proxy, unregistered 502, or static fallback
//!
//! # Design Decisions
//! - State is built once and shared read-only behind an `Arc`
//! - Bad rules and unreadable policy files are logged and skipped
//! - Every request produces exactly one access log record

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, Rule};
use crate::http::request::{request_host, request_target, ClientInfo};
use crate::http::response;
use crate::http::static_files::StaticFiles;
use crate::observability::AccessRecord;
use crate::proxy::{drain, Connector, ProxyContext, ProxyEngine, UpstreamError};
use crate::routing::{Resource, RouteTable};
use crate::security::{loader, Forwarding, HostPolicies};

/// A policy file that loaded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFile {
    /// `cors` or `csp`.
    pub kind: &'static str,
    pub host: String,
    pub path: PathBuf,
}

/// Everything a request needs, shared by all connections.
pub struct Gateway {
    routes: RouteTable,
    policies: HostPolicies,
    engine: ProxyEngine,
    files: Option<StaticFiles>,
    mime: Vec<(String, String)>,
    policy_files: Vec<PolicyFile>,
    proxy_only: bool,
    force_local: bool,
}

impl Gateway {
    /// Compile the configuration's rules into routes, policies and MIME overrides.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let mut routes = RouteTable::new();
        let mut policies = HostPolicies::new();
        let mut mime = Vec::new();
        let mut policy_files = Vec::new();

        for text in &config.rules {
            let rule = match Rule::parse(text, &config.base_dir) {
                Ok(rule) => rule,
                Err(err) => {
                    tracing::warn!(rule = %text, error = %err, "Skipping invalid rule");
                    continue;
                }
            };

            match rule {
                Rule::Proxy { rule, is_default } => routes.insert(rule, is_default),
                Rule::Mime { extension, mime: value } => mime.push((extension, value)),
                Rule::Cors { host, policy_path } => match loader::load_table(&policy_path) {
                    Ok(handler) => {
                        policies.set_cors(&host, handler);
                        policy_files.push(PolicyFile { kind: "cors", host, path: policy_path });
                    }
                    Err(err) => tracing::error!(
                        host = %host,
                        path = %policy_path.display(),
                        error = %err,
                        "Cannot load CORS policy"
                    ),
                },
                Rule::Csp { host, policy_path } => match loader::load_table(&policy_path) {
                    Ok(handler) => {
                        policies.set_csp(&host, handler);
                        policy_files.push(PolicyFile { kind: "csp", host, path: policy_path });
                    }
                    Err(err) => tracing::error!(
                        host = %host,
                        path = %policy_path.display(),
                        error = %err,
                        "Cannot load CSP policy"
                    ),
                },
            }
        }

        let files = config.document_root.as_ref().map(|root| {
            mime.iter()
                .fold(StaticFiles::new(root), |files, (ext, value)| files.with_mime(ext, value))
        });

        let connect_timeout = match config.timeouts.connect_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let connector = Connector::new(config.ssl_check, connect_timeout)?;
        let engine = ProxyEngine::new(
            connector,
            config.invisible,
            Duration::from_secs(config.timeouts.drain_secs),
        );

        Ok(Self {
            routes,
            policies,
            engine,
            files,
            mime,
            policy_files,
            proxy_only: config.proxy_only,
            force_local: config.force_local,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn policies(&self) -> &HostPolicies {
        &self.policies
    }

    /// Mutable access for installing programmatic (dynamic) policy handlers.
    pub fn policies_mut(&mut self) -> &mut HostPolicies {
        &mut self.policies
    }

    pub fn files(&self) -> Option<&StaticFiles> {
        self.files.as_ref()
    }

    /// `mime:` overrides in declaration order.
    pub fn mime_overrides(&self) -> &[(String, String)] {
        &self.mime
    }

    pub fn policy_files(&self) -> &[PolicyFile] {
        &self.policy_files
    }
}

/// Application state injected into the handler.
#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    /// Whether the inbound side is TLS (drives `X-Forwarded-Proto`).
    tls: bool,
    /// Client source for listeners without a socket peer.
    listener: Arc<str>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    gateway: Arc<Gateway>,
    drain_timeout: Duration,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        Ok(Self::from_gateway(
            Gateway::from_config(config)?,
            Duration::from_secs(config.timeouts.drain_secs),
        ))
    }

    pub fn from_gateway(gateway: Gateway, drain_timeout: Duration) -> Self {
        Self {
            gateway: Arc::new(gateway),
            drain_timeout,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    fn router(&self, tls: bool, listener: &str) -> Router {
        let state = AppState {
            gateway: self.gateway.clone(),
            tls,
            listener: Arc::from(listener),
        };

        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %uuid::Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router(false, &addr.to_string())
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        let grace = self.drain_timeout;
        tokio::spawn(async move {
            wait(shutdown).await;
            stopper.graceful_shutdown(Some(grace));
        });

        let app = self
            .router(true, &addr.to_string())
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Serve plain HTTP on a Unix domain socket until `shutdown` fires.
    pub async fn run_unix(
        self,
        listener: UnixListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let label = listener
            .local_addr()?
            .as_pathname()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "unix".to_string());
        tracing::info!(socket = %label, "HTTP server starting");

        let app = self.router(false, &label);
        axum::serve(listener, app)
            .with_graceful_shutdown(wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn wait(mut shutdown: broadcast::Receiver<()>) {
    // a closed channel means the coordinator is gone; stop as well
    let _ = shutdown.recv().await;
}

/// Catch-all handler: proxy, reject, or serve files.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let gateway = &state.gateway;

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let host = request_host(request.headers(), request.uri());
    let target = request_target(request.uri());
    let client = ClientInfo::resolve(request.headers(), peer, &state.listener, gateway.force_local);
    let method = request.method().as_str().to_string();

    if let Some(rules) = gateway.routes.lookup(&host) {
        let resource = Resource::from_target(&target);
        let Some(rule) = RouteTable::select(rules, resource.path()) else {
            let requested = format!("Host:{}{}", host, target);
            return reject(request, client.source, requested, method, started, "Unregistered proxy path!")
                .await;
        };

        let ctx = ProxyContext {
            rule,
            resource: &resource,
            cors: gateway.policies.cors(&host),
            csp: gateway.policies.csp(&host),
            forwarding: Forwarding {
                target,
                tls: state.tls,
                real_ip: client.real_ip,
                real_port: client.real_port,
            },
            source: client.source,
            started,
        };
        return gateway.engine.forward(ctx, request).await;
    }

    if gateway.proxy_only {
        let requested = format!("Host:{}{}", host, target);
        return reject(request, client.source, requested, method, started, "Unregistered host!").await;
    }

    let response = match &gateway.files {
        Some(files) => files.serve(request).await,
        None => response::empty(StatusCode::NOT_FOUND, Default::default()),
    };
    AccessRecord::new(response.status().as_u16(), &client.source, "static", &method, started)
        .emit(Some(target.as_str()));
    response
}

/// Read the request body to the end, then answer 502 with `message`.
///
/// `requested` is `Host:<host><target>`, reported as the access detail.
async fn reject(
    request: Request<Body>,
    source: String,
    requested: String,
    method: String,
    started: Instant,
    message: &'static str,
) -> Response {
    let summary = drain(request.into_body()).await;
    if let Some(err) = summary.error {
        tracing::warn!(source = %source, error = %err, "Cannot read request body");
        AccessRecord::new(500, &source, "unregistered", &method, started).emit(Some(requested.as_str()));
        return response::plain(StatusCode::INTERNAL_SERVER_ERROR, "Request body could not be read");
    }

    tracing::debug!(bytes = summary.length, "Discarded request body");
    AccessRecord::new(502, &source, "unregistered", &method, started).emit(Some(requested.as_str()));
    response::plain(StatusCode::BAD_GATEWAY, message)
}
