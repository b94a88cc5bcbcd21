//! Policy handlers shared by the CORS and CSP evaluators.
//!
//! A host's policy is either one handler applied to every path, or a pattern
//! table compiled through [`PathMatcher`]. Both shapes are resolved once at
//! startup into [`Handler`], so the request path never re-inspects config.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::routing::{PathMatcher, PatternError, Resource};
use crate::security::cors::CorsDecision;
use crate::security::csp::CspPolicy;

/// Errors from loading or running policy handlers.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("cannot read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("policy file {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("policy file {path} must contain an object mapping patterns to policies")]
    NotATable { path: String },

    #[error("handler for pattern `{pattern}` must be an object")]
    InvalidHandler { pattern: String },

    #[error("policy for pattern `{pattern}` is malformed: {source}")]
    InvalidPolicy {
        pattern: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("policy handler failed: {0}")]
    Handler(String),
}

/// Field deserializer that reads a value of the wrong type as absent.
///
/// Use with `#[serde(default, deserialize_with = "lenient")]` on `Option` fields.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Read-only view of a request handed to policy handlers.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub resource: &'a Resource,
    pub origin: Option<&'a str>,
    pub referer: Option<&'a str>,
    /// For CORS preflight this is `Access-Control-Request-Method`.
    pub method: Option<&'a str>,
    pub preflight: bool,
    /// Upstream status; only set when evaluating CSP.
    pub status: Option<StatusCode>,
}

/// A policy-producing function.
pub type PolicyFn<P> = Arc<dyn Fn(&RequestContext<'_>) -> Result<P, PolicyError> + Send + Sync>;

/// Wrap a fixed policy as a handler.
pub fn constant<P>(policy: P) -> PolicyFn<P>
where
    P: Clone + Send + Sync + 'static,
{
    Arc::new(move |_: &RequestContext<'_>| -> Result<P, PolicyError> { Ok(policy.clone()) })
}

/// Wrap a closure as a handler.
pub fn dynamic<P, F>(f: F) -> PolicyFn<P>
where
    F: Fn(&RequestContext<'_>) -> Result<P, PolicyError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A host's compiled policy.
pub enum Handler<P> {
    /// One function for every path.
    Direct(PolicyFn<P>),
    /// Pattern-keyed handlers.
    Table(PathMatcher<PolicyFn<P>>),
}

impl<P> Handler<P> {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> Result<P, PolicyError> + Send + Sync + 'static,
    {
        Handler::Direct(Arc::new(f))
    }

    /// Compile `(pattern, handler)` pairs; any bad pattern fails the whole table.
    pub fn table<I, S>(rules: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = (S, PolicyFn<P>)>,
        S: Into<String>,
    {
        PathMatcher::compile(rules).map(Handler::Table)
    }

    /// Run the handler governing `ctx.resource`; no match yields the empty policy.
    pub fn evaluate(&self, ctx: &RequestContext<'_>) -> Result<P, PolicyError>
    where
        P: Default,
    {
        match self {
            Handler::Direct(f) => f(ctx),
            Handler::Table(matcher) => match matcher.resolve(ctx.resource.path()) {
                Some(entry) => (entry.handler())(ctx),
                None => Ok(P::default()),
            },
        }
    }
}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Direct(_) => f.write_str("Handler::Direct"),
            Handler::Table(matcher) => write!(f, "Handler::Table({} patterns)", matcher.len()),
        }
    }
}

/// CORS and CSP handlers keyed by request host.
#[derive(Debug, Default)]
pub struct HostPolicies {
    cors: HashMap<String, Handler<CorsDecision>>,
    csp: HashMap<String, Handler<CspPolicy>>,
}

impl HostPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cors(&mut self, host: &str, handler: Handler<CorsDecision>) {
        self.cors.insert(host.to_ascii_lowercase(), handler);
    }

    pub fn set_csp(&mut self, host: &str, handler: Handler<CspPolicy>) {
        self.csp.insert(host.to_ascii_lowercase(), handler);
    }

    pub fn cors(&self, host: &str) -> Option<&Handler<CorsDecision>> {
        self.cors.get(&host.to_ascii_lowercase())
    }

    pub fn csp(&self, host: &str) -> Option<&Handler<CspPolicy>> {
        self.csp.get(&host.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(resource: &Resource) -> RequestContext<'_> {
        RequestContext {
            resource,
            origin: None,
            referer: None,
            method: Some("GET"),
            preflight: false,
            status: None,
        }
    }

    #[test]
    fn direct_handler_applies_to_every_path() {
        let handler: Handler<String> = Handler::direct(|ctx| Ok(ctx.resource.path().to_string()));
        let resource = Resource::parse("/any/where?x");
        assert_eq!(handler.evaluate(&ctx(&resource)).unwrap(), "/any/where");
    }

    #[test]
    fn table_without_match_yields_default() {
        let handler: Handler<String> =
            Handler::table(vec![("/api", constant("api".to_string()))]).unwrap();
        let resource = Resource::parse("/static/app.js");
        assert_eq!(handler.evaluate(&ctx(&resource)).unwrap(), "");
    }

    #[test]
    fn table_dispatches_to_dynamic_handler() {
        let handler: Handler<String> = Handler::table(vec![
            ("/", constant("root".to_string())),
            (
                "= /who",
                dynamic(|ctx: &RequestContext<'_>| Ok(ctx.method.unwrap_or("-").to_string())),
            ),
        ])
        .unwrap();

        let who = Resource::parse("/who");
        assert_eq!(handler.evaluate(&ctx(&who)).unwrap(), "GET");
        let other = Resource::parse("/elsewhere");
        assert_eq!(handler.evaluate(&ctx(&other)).unwrap(), "root");
    }

    #[test]
    fn hosts_are_case_insensitive() {
        let mut policies = HostPolicies::new();
        policies.set_csp("Example.COM", Handler::direct(|_| Ok(CspPolicy::default())));
        assert!(policies.csp("example.com").is_some());
        assert!(policies.cors("example.com").is_none());
    }
}
