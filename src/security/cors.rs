//! Cross-Origin Resource Sharing gate.
//!
//! # Responsibilities
//! - Classify a request as preflight or actual
//! - Run the host's CORS handler for the request path
//! - Build `Access-Control-*` response headers from the returned policy
//! - Decide whether the request may reach the upstream
//!
//! # Design Decisions
//! - Preflight is a literal `OPTIONS`; handlers see the requested method
//! - A `Deny` decision or a failing handler blocks the request (fail closed)
//! - Preflights and denials are answered here; the upstream is never dialed
//! - Method, header, expose and max-age headers are sent on preflight only;
//!   origin and credentials are sent on every response

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, REFERER,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Deserializer};

use crate::routing::Resource;
use crate::security::policy::{lenient, Handler, RequestContext};

/// Policy returned by a CORS handler. Absent fields impose nothing.
///
/// Fields of the wrong type in policy JSON are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CorsPolicy {
    #[serde(default, deserialize_with = "lenient")]
    pub allow_origin: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub allow_methods: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub allow_headers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub allow_credentials: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub expose_headers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_age: Option<i64>,
}

/// Outcome of a CORS handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    Allow(CorsPolicy),
    /// Explicit refusal.
    Deny,
}

impl Default for CorsDecision {
    fn default() -> Self {
        CorsDecision::Allow(CorsPolicy::default())
    }
}

impl From<CorsPolicy> for CorsDecision {
    fn from(policy: CorsPolicy) -> Self {
        CorsDecision::Allow(policy)
    }
}

impl<'de> Deserialize<'de> for CorsDecision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CorsPolicy::deserialize(deserializer).map(CorsDecision::Allow)
    }
}

/// What the gateway does with the request after the CORS check.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsVerdict {
    /// Forward upstream; merge these headers into the upstream response.
    Proceed(HeaderMap),
    /// Answer directly with an empty body.
    Respond { status: StatusCode, headers: HeaderMap },
}

/// Evaluate the host's CORS handler for one request.
pub fn evaluate(
    handler: Option<&Handler<CorsDecision>>,
    resource: &Resource,
    method: &Method,
    headers: &HeaderMap,
) -> CorsVerdict {
    let Some(handler) = handler else {
        return CorsVerdict::Proceed(HeaderMap::new());
    };

    let preflight = method == Method::OPTIONS;
    let origin = header_str(headers, &ORIGIN);
    let ctx = RequestContext {
        resource,
        origin,
        referer: header_str(headers, &REFERER),
        method: if preflight {
            header_str(headers, &ACCESS_CONTROL_REQUEST_METHOD)
        } else {
            Some(method.as_str())
        },
        preflight,
        status: None,
    };

    let decision = handler.evaluate(&ctx).unwrap_or_else(|err| {
        tracing::warn!(path = %resource.path(), error = %err, "CORS handler failed, denying request");
        CorsDecision::Deny
    });

    let (allowed, cors_headers) = match decision {
        CorsDecision::Deny => (false, HeaderMap::new()),
        CorsDecision::Allow(policy) => apply_policy(&policy, preflight, origin, method),
    };

    if preflight || !allowed {
        let status = if allowed { StatusCode::OK } else { StatusCode::FORBIDDEN };
        CorsVerdict::Respond {
            status,
            headers: cors_headers,
        }
    } else {
        CorsVerdict::Proceed(cors_headers)
    }
}

fn apply_policy(
    policy: &CorsPolicy,
    preflight: bool,
    origin: Option<&str>,
    method: &Method,
) -> (bool, HeaderMap) {
    let mut allowed = true;
    let mut headers = HeaderMap::new();

    if let Some(allow_origin) = &policy.allow_origin {
        if allow_origin != "*" && origin != Some(allow_origin.as_str()) {
            allowed = false;
        }
        if !put(&mut headers, ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin) {
            allowed = false;
        }
    }

    if let Some(methods) = &policy.allow_methods {
        if !methods.iter().any(|m| m == method.as_str()) {
            allowed = false;
        }
        if preflight {
            put(&mut headers, ACCESS_CONTROL_ALLOW_METHODS, &methods.join(", "));
        }
    }

    if let (Some(allow_headers), true) = (&policy.allow_headers, preflight) {
        put(&mut headers, ACCESS_CONTROL_ALLOW_HEADERS, &allow_headers.join(", "));
    }

    if let Some(credentials) = policy.allow_credentials {
        let value = if credentials { "true" } else { "false" };
        put(&mut headers, ACCESS_CONTROL_ALLOW_CREDENTIALS, value);
    }

    if let (Some(expose), true) = (&policy.expose_headers, preflight) {
        put(&mut headers, ACCESS_CONTROL_EXPOSE_HEADERS, &expose.join(", "));
    }

    if let (Some(max_age), true) = (policy.max_age, preflight) {
        put(&mut headers, ACCESS_CONTROL_MAX_AGE, &max_age.to_string());
    }

    (allowed, headers)
}

fn put(headers: &mut HeaderMap, name: HeaderName, value: &str) -> bool {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
            true
        }
        Err(_) => {
            tracing::warn!(header = %name, value = %value, "Dropping unrepresentable CORS header value");
            false
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
