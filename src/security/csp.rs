//! Content-Security-Policy synthesis.
//!
//! # Responsibilities
//! - Run the host's CSP handler once the upstream status is known
//! - Render whitelisted directives into one `Content-Security-Policy` value
//!
//! # Design Decisions
//! - Directives render in whitelist order, not policy order
//! - Unknown directives, non-list values and empty token lists are ignored
//! - Handler failures never abort the response; they yield no header

use std::collections::HashMap;

use axum::http::header::{CONTENT_SECURITY_POLICY, ORIGIN, REFERER};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::routing::Resource;
use crate::security::policy::{Handler, RequestContext};

/// Directives emitted, in emission order.
pub const DIRECTIVES: [&str; 14] = [
    "child-src",
    "connect-src",
    "default-src",
    "font-src",
    "frame-src",
    "img-src",
    "manifest-src",
    "media-src",
    "object-src",
    "prefetch-src",
    "script-src",
    "style-src",
    "webrtc-src",
    "worker-src",
];

/// Source tokens that must be single-quoted on the wire.
pub const KEYWORDS: [&str; 5] = ["self", "unsafe-inline", "unsafe-eval", "none", "strict-dynamic"];

/// Directive name to ordered source tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspPolicy(HashMap<String, Vec<String>>);

impl<'de> Deserialize<'de> for CspPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, Value>::deserialize(deserializer)?;
        let directives = raw
            .into_iter()
            .filter(|(name, _)| DIRECTIVES.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                let sources: Vec<String> = serde_json::from_value(value).ok()?;
                Some((name, sources))
            })
            .collect();
        Ok(Self(directives))
    }
}

impl CspPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style directive setter.
    pub fn directive<I, S>(mut self, name: &str, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(name.to_string(), sources.into_iter().map(Into::into).collect());
        self
    }

    /// The header value, or `None` when no whitelisted directive has sources.
    pub fn render(&self) -> Option<String> {
        let rendered: Vec<String> = DIRECTIVES
            .iter()
            .filter_map(|name| {
                let sources = self.0.get(*name).filter(|s| !s.is_empty())?;
                let tokens: Vec<String> = sources.iter().map(|s| quote_keyword(s)).collect();
                Some(format!("{} {}", name, tokens.join(" ")))
            })
            .collect();

        (!rendered.is_empty()).then(|| rendered.join("; "))
    }
}

fn quote_keyword(token: &str) -> String {
    if KEYWORDS.contains(&token) {
        format!("'{}'", token)
    } else {
        token.to_string()
    }
}

/// Headers to merge into the upstream response; empty or one CSP header.
pub fn evaluate(
    handler: Option<&Handler<CspPolicy>>,
    resource: &Resource,
    method: &Method,
    headers: &HeaderMap,
    status: StatusCode,
) -> HeaderMap {
    let mut out = HeaderMap::new();
    let Some(handler) = handler else {
        return out;
    };

    let ctx = RequestContext {
        resource,
        origin: headers.get(ORIGIN).and_then(|v| v.to_str().ok()),
        referer: headers.get(REFERER).and_then(|v| v.to_str().ok()),
        method: Some(method.as_str()),
        preflight: method == Method::OPTIONS,
        status: Some(status),
    };

    let policy = match handler.evaluate(&ctx) {
        Ok(policy) => policy,
        Err(err) => {
            tracing::warn!(path = %resource.path(), error = %err, "CSP handler failed, no policy applied");
            return out;
        }
    };

    if let Some(value) = policy.render() {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                out.insert(CONTENT_SECURITY_POLICY, value);
            }
            Err(_) => {
                tracing::warn!(path = %resource.path(), "CSP policy renders to an invalid header value");
            }
        }
    }
    out
}
