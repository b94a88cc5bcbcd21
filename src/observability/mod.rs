//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → access.rs (one event per finished request)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (compact tracing format)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (from TraceLayer span) flows through request-scoped events
//! - Metrics are cheap (atomic increments)

pub mod access;
pub mod logging;
pub mod metrics;

pub use access::AccessRecord;
