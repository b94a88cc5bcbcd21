//! lazy-gateway: an HTTP/HTTPS gateway with per-host proxy, CORS and CSP rules.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{Gateway, GatewayServer};
pub use lifecycle::Shutdown;
