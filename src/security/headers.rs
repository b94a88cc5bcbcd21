//! Upstream request header preparation.
//!
//! # Responsibilities
//! - Copy inbound headers minus `Host` and hop-by-hop connection headers
//! - Add X-Forwarded-Host, X-Forwarded-Path, X-Forwarded-Proto
//! - Add X-Real-Ip / X-Real-Port from the resolved client address
//! - Set `Host` to the upstream authority
//!
//! # Design Decisions
//! - Existing X-Forwarded-Host / X-Forwarded-Proto values are kept (chained gateways)
//! - Invisible mode forwards the inbound headers untouched apart from `Host`
//! - Client address headers are removed when no address is known
//! - Body framing headers (`Content-Length`, `Transfer-Encoding`) pass through

use axum::http::header::{CONNECTION, HOST, TE, TRAILER, UPGRADE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PATH: HeaderName = HeaderName::from_static("x-forwarded-path");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_REAL_PORT: HeaderName = HeaderName::from_static("x-real-port");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// What the gateway knows about the inbound request, for forwarding headers.
#[derive(Debug, Clone, Default)]
pub struct Forwarding {
    /// Inbound request target, query included.
    pub target: String,
    /// Whether the inbound listener terminated TLS.
    pub tls: bool,
    /// Client ip: a trusted `X-Real-Ip` value, else the socket peer.
    pub real_ip: Option<String>,
    /// Client port: a trusted `X-Real-Port` value, else the socket peer.
    pub real_port: Option<String>,
}

/// Build the header set sent upstream.
///
/// `forwarding` is `None` in invisible mode.
pub fn upstream_headers(
    inbound: &HeaderMap,
    authority: &str,
    forwarding: Option<&Forwarding>,
) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in [HOST, CONNECTION, KEEP_ALIVE, PROXY_CONNECTION, TE, TRAILER, UPGRADE] {
        headers.remove(name);
    }

    if let Some(fwd) = forwarding {
        let forwarded_host = inbound
            .get(&X_FORWARDED_HOST)
            .or_else(|| inbound.get(HOST))
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(""));
        headers.insert(X_FORWARDED_HOST, forwarded_host);

        set(&mut headers, X_FORWARDED_PATH, Some(fwd.target.as_str()));

        if !inbound.contains_key(&X_FORWARDED_PROTO) {
            let proto = if fwd.tls { "https" } else { "http" };
            headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));
        }

        set(&mut headers, X_REAL_IP, fwd.real_ip.as_deref());
        set(&mut headers, X_REAL_PORT, fwd.real_port.as_deref());
    }

    set(&mut headers, HOST, Some(authority));
    headers
}

/// Insert `value`, or remove the header when it is absent or not representable.
fn set(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    match value.map(HeaderValue::from_str) {
        Some(Ok(value)) => {
            headers.insert(name, value);
        }
        Some(Err(_)) => {
            tracing::debug!(header = %name, "Dropping unrepresentable forwarding header");
            headers.remove(name);
        }
        None => {
            headers.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("app.test:8080"));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers
    }

    fn forwarding() -> Forwarding {
        Forwarding {
            target: "/api/users?id=1".to_string(),
            tls: false,
            real_ip: Some("10.0.0.7".to_string()),
            real_port: Some("51234".to_string()),
        }
    }

    #[test]
    fn adds_forwarding_headers() {
        let out = upstream_headers(&inbound(), "127.0.0.1:5080", Some(&forwarding()));
        assert_eq!(out[HOST], "127.0.0.1:5080");
        assert_eq!(out[X_FORWARDED_HOST], "app.test:8080");
        assert_eq!(out[X_FORWARDED_PATH], "/api/users?id=1");
        assert_eq!(out[X_FORWARDED_PROTO], "http");
        assert_eq!(out[X_REAL_IP], "10.0.0.7");
        assert_eq!(out[X_REAL_PORT], "51234");
        assert_eq!(out["accept"], "*/*");
        assert!(out.get(CONNECTION).is_none());
    }

    #[test]
    fn keeps_chained_forwarding_values() {
        let mut headers = inbound();
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("edge.test"));
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));

        let out = upstream_headers(&headers, "127.0.0.1:5080", Some(&forwarding()));
        assert_eq!(out[X_FORWARDED_HOST], "edge.test");
        assert_eq!(out[X_FORWARDED_PROTO], "https");
    }

    #[test]
    fn tls_listener_reports_https() {
        let fwd = Forwarding {
            tls: true,
            ..forwarding()
        };
        let out = upstream_headers(&inbound(), "backend:443", Some(&fwd));
        assert_eq!(out[X_FORWARDED_PROTO], "https");
    }

    #[test]
    fn unknown_client_address_removes_real_headers() {
        let mut headers = inbound();
        headers.insert(X_REAL_IP, HeaderValue::from_static("1.2.3.4"));
        let fwd = Forwarding {
            real_ip: None,
            real_port: None,
            ..forwarding()
        };
        let out = upstream_headers(&headers, "localhost", Some(&fwd));
        assert!(out.get(X_REAL_IP).is_none());
        assert!(out.get(X_REAL_PORT).is_none());
    }

    #[test]
    fn invisible_mode_only_replaces_host() {
        let out = upstream_headers(&inbound(), "localhost", None);
        assert_eq!(out[HOST], "localhost");
        assert!(out.get(X_FORWARDED_HOST).is_none());
        assert!(out.get(X_FORWARDED_PATH).is_none());
        assert!(out.get(X_REAL_IP).is_none());
    }

    #[test]
    fn missing_host_forwards_empty_value() {
        let out = upstream_headers(&HeaderMap::new(), "localhost", Some(&forwarding()));
        assert_eq!(out[X_FORWARDED_HOST], "");
    }
}
