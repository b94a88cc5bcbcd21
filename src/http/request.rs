//! Request inspection.
//!
//! # Responsibilities
//! - Extract the routing host from the `Host` header
//! - Normalise the request target
//! - Resolve the client identity used in logs and `X-Real-*` headers
//!
//! # Design Decisions
//! - Hosts compare lower-cased with the port stripped
//! - `X-Real-Ip` / `X-Real-Port` from the client are trusted (the gateway
//!   is expected to sit behind, or be, the edge)
//! - `force_local` reports the socket peer in logs even when `X-Real-Ip` is set

use std::net::SocketAddr;

use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, Uri};

use crate::security::headers::{X_REAL_IP, X_REAL_PORT};

/// Host used for routing: `Host` header (or URI authority), port stripped, lower-cased.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    let raw = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .or_else(|| uri.host())
        .unwrap_or("");

    let host = if let Some(rest) = raw.strip_prefix('[') {
        // bracketed IPv6 literal
        rest.split(']').next().unwrap_or(rest)
    } else {
        raw.split(':').next().unwrap_or(raw)
    };
    host.trim().to_ascii_lowercase()
}

/// Request target (path and query) starting with `/`.
pub fn request_target(uri: &Uri) -> String {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{}", target)
    }
}

/// Who sent the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Identifier for access logs.
    pub source: String,
    /// Value for `X-Real-Ip`, if any.
    pub real_ip: Option<String>,
    /// Value for `X-Real-Port`, if any.
    pub real_port: Option<String>,
}

impl ClientInfo {
    /// `peer` is `None` on Unix-socket listeners; `listener` labels those.
    pub fn resolve(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        listener: &str,
        force_local: bool,
    ) -> Self {
        let trusted = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let proxy_ip = trusted(&X_REAL_IP);
        let proxy_port = trusted(&X_REAL_PORT);

        let source = match (&proxy_ip, force_local, peer) {
            (Some(ip), false, _) => match &proxy_port {
                Some(port) => format!("{}:{}", ip, port),
                None => ip.clone(),
            },
            (_, _, Some(peer)) => peer.to_string(),
            (_, _, None) => listener.to_string(),
        };

        Self {
            source,
            real_ip: proxy_ip.or_else(|| peer.map(|p| p.ip().to_string())),
            real_port: proxy_port.or_else(|| peer.map(|p| p.port().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_host(host: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static(host));
        headers
    }

    #[test]
    fn host_strips_port_and_case() {
        let uri = Uri::from_static("/");
        assert_eq!(request_host(&with_host("Example.COM:8080"), &uri), "example.com");
        assert_eq!(request_host(&with_host(" localhost "), &uri), "localhost");
        assert_eq!(request_host(&with_host("[::1]:8080"), &uri), "::1");
        assert_eq!(request_host(&HeaderMap::new(), &uri), "");
    }

    #[test]
    fn host_falls_back_to_absolute_uri() {
        let uri = Uri::from_static("http://Proxy.Test:81/a");
        assert_eq!(request_host(&HeaderMap::new(), &uri), "proxy.test");
    }

    #[test]
    fn target_keeps_query() {
        assert_eq!(request_target(&Uri::from_static("/a/b?x=1")), "/a/b?x=1");
        assert_eq!(request_target(&Uri::from_static("http://h/")), "/");
    }

    #[test]
    fn socket_peer_when_no_trusted_headers() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let info = ClientInfo::resolve(&HeaderMap::new(), Some(peer), "gw.sock", false);
        assert_eq!(info.source, "10.1.2.3:5555");
        assert_eq!(info.real_ip.as_deref(), Some("10.1.2.3"));
        assert_eq!(info.real_port.as_deref(), Some("5555"));
    }

    #[test]
    fn trusted_headers_win_unless_forced_local() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("203.0.113.9"));
        headers.insert(X_REAL_PORT, HeaderValue::from_static("443"));

        let info = ClientInfo::resolve(&headers, Some(peer), "", false);
        assert_eq!(info.source, "203.0.113.9:443");
        assert_eq!(info.real_ip.as_deref(), Some("203.0.113.9"));

        let forced = ClientInfo::resolve(&headers, Some(peer), "", true);
        assert_eq!(forced.source, "127.0.0.1:4000");
        // forwarding still carries the trusted values
        assert_eq!(forced.real_port.as_deref(), Some("443"));
    }

    #[test]
    fn unix_listener_uses_label() {
        let info = ClientInfo::resolve(&HeaderMap::new(), None, "/run/gw.sock", false);
        assert_eq!(info.source, "/run/gw.sock");
        assert_eq!(info.real_ip, None);
        assert_eq!(info.real_port, None);
    }
}
