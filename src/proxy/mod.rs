//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRule + request
//!     → engine.rs (CORS gate, upstream exchange, header merge)
//!     → upstream.rs (dial TCP / TLS / Unix socket, HTTP/1.1 handshake)
//!     → body.rs (stream response, drain on failure)
//!     → Send to client
//! ```

pub mod body;
pub mod engine;
pub mod upstream;

pub use body::{drain, DrainSummary, ProxyBody};
pub use engine::{ProxyContext, ProxyEngine};
pub use upstream::{Connector, UpstreamError};
