//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → listener.rs (bind TCP, resolve TLS address, or bind Unix socket)
//!     → tls.rs (certificate + key for HTTPS)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - A Unix socket takes precedence over TCP and never carries TLS
//! - A stale socket file from a previous run is removed before binding

pub mod listener;
pub mod tls;

pub use listener::{bind, BoundListener, ListenerError};
pub use tls::load_tls_config;
