//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / TLS / Unix connection
//!     → server.rs (Axum setup, dispatch by host)
//!     → request.rs (host, target, client identity)
//!     → [proxy engine] or static_files.rs
//!     → response.rs (gateway responses, header merge)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::ClientInfo;
pub use server::{Gateway, GatewayServer, PolicyFile};
pub use static_files::StaticFiles;
