//! Security subsystem: per-host CORS and CSP policies.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     cors:/csp: rules
//!     → loader.rs (JSON pattern table → Handler)
//!     → policy.rs (HostPolicies, keyed by host)
//!
//! Per proxied request:
//!     → cors.rs (preflight / deny answered here, else headers carried)
//!     → headers.rs (upstream Host, X-Forwarded-*, X-Real-*)
//!     → [upstream responds]
//!     → csp.rs (header from status-aware policy)
//!     → merged into the upstream response without overwriting
//! ```
//!
//! # Design Decisions
//! - Fail closed: a broken policy file leaves the host without that policy
//!   and a broken CORS handler denies the request
//! - CSP never blocks a response

pub mod cors;
pub mod csp;
pub mod headers;
pub mod loader;
pub mod policy;

pub use cors::{CorsDecision, CorsPolicy, CorsVerdict};
pub use csp::CspPolicy;
pub use headers::Forwarding;
pub use policy::{constant, dynamic, Handler, HostPolicies, PolicyError, PolicyFn, RequestContext};
