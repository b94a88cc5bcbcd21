//! Proxy engine: one proxied request from CORS gate to streamed response.
//!
//! # Data Flow
//! ```text
//! GATING            cors::evaluate → preflight / deny answered here → DONE
//! DIALING           Connector::open (TCP / TLS / Unix socket)      → ERROR: 502
//! STREAMING_REQUEST request body piped by the connection task
//! AWAITING_RESPONSE upstream head received
//!                   csp::evaluate(status), CORS + CSP merged (no overwrite)
//! STREAMING_RESPONSE ProxyBody pulls frames as the client reads
//!                   → DONE, or ERROR: drain upstream, log, truncate
//! ```
//!
//! # Design Decisions
//! - No retries; every failure is reported once
//! - The response head is handed to the server in one piece
//! - Access log and metrics fire exactly once per request

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use hyper::body::Incoming;

use crate::http::response;
use crate::observability::{metrics, AccessRecord};
use crate::proxy::body::{ProxyBody, StreamLog};
use crate::proxy::upstream::{Connector, UpstreamError};
use crate::routing::{ProxyRule, Resource};
use crate::security::cors::{self, CorsDecision, CorsVerdict};
use crate::security::csp::{self, CspPolicy};
use crate::security::headers::{upstream_headers, Forwarding};
use crate::security::Handler;

/// Per-request inputs to [`ProxyEngine::forward`].
pub struct ProxyContext<'a> {
    pub rule: &'a ProxyRule,
    pub resource: &'a Resource,
    pub cors: Option<&'a Handler<CorsDecision>>,
    pub csp: Option<&'a Handler<CspPolicy>>,
    pub forwarding: Forwarding,
    /// Client identifier for logs.
    pub source: String,
    pub started: Instant,
}

impl ProxyContext<'_> {
    fn access(&self, status: StatusCode, method: &str) -> AccessRecord {
        AccessRecord::new(status.as_u16(), &self.source, &self.rule.rule, method, self.started)
    }
}

/// Forwards requests to the upstream named by a proxy rule.
#[derive(Clone)]
pub struct ProxyEngine {
    connector: Connector,
    invisible: bool,
    drain_timeout: Duration,
}

impl ProxyEngine {
    pub fn new(connector: Connector, invisible: bool, drain_timeout: Duration) -> Self {
        Self {
            connector,
            invisible,
            drain_timeout,
        }
    }

    /// Run one request through the proxy pipeline. Never fails: upstream
    /// problems become a 502 or a truncated body.
    pub async fn forward(&self, ctx: ProxyContext<'_>, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let method = parts.method.as_str().to_string();

        let cors_headers = match cors::evaluate(ctx.cors, ctx.resource, &parts.method, &parts.headers) {
            CorsVerdict::Proceed(headers) => headers,
            CorsVerdict::Respond { status, headers } => {
                if status == StatusCode::FORBIDDEN {
                    tracing::warn!(resource = %ctx.resource, "Access to {} is blocked by CORS", ctx.resource);
                    ctx.access(status, &method).emit(Some("blocked by CORS"));
                } else {
                    ctx.access(status, &method).emit(Some("preflight"));
                }
                return response::empty(status, headers);
            }
        };

        let upstream_response = match self.exchange(&ctx, &parts, body).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    upstream = %ctx.rule.upstream,
                    rule = %ctx.rule.rule,
                    error = %err,
                    "Upstream request failed"
                );
                metrics::record_upstream_error(err.kind());
                ctx.access(StatusCode::BAD_GATEWAY, &method)
                    .emit(Some(err.to_string().as_str()));
                return response::bad_gateway();
            }
        };

        let status = upstream_response.status();
        let csp_headers = csp::evaluate(ctx.csp, ctx.resource, &parts.method, &parts.headers, status);

        let (mut head, incoming) = upstream_response.into_parts();
        response::merge_missing(&mut head.headers, &cors_headers);
        response::merge_missing(&mut head.headers, &csp_headers);

        let log = StreamLog {
            access: ctx.access(status, &method),
            upstream: ctx.rule.upstream.to_string(),
            drain_timeout: self.drain_timeout,
        };
        Response::from_parts(head, Body::new(ProxyBody::new(incoming, log)))
    }

    async fn exchange(
        &self,
        ctx: &ProxyContext<'_>,
        parts: &Parts,
        body: Body,
    ) -> Result<axum::http::Response<Incoming>, UpstreamError> {
        let mut sender = self.connector.open(&ctx.rule.upstream).await?;

        let target = ctx.rule.upstream_target(&ctx.forwarding.target);
        let forwarding = (!self.invisible).then_some(&ctx.forwarding);

        let mut request = Request::builder()
            .method(parts.method.clone())
            .uri(target)
            .body(body)?;
        *request.headers_mut() =
            upstream_headers(&parts.headers, &ctx.rule.upstream.authority(), forwarding);

        tracing::debug!(
            upstream = %ctx.rule.upstream,
            target = %request.uri(),
            "Forwarding request"
        );

        sender.send_request(request).await.map_err(UpstreamError::Send)
    }
}
