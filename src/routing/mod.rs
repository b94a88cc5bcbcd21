//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, target)
//!     → resource.rs (split target into path / query / fragment)
//!     → router.rs (host lookup, default host, longest src_path)
//!     → Return: matched ProxyRule or NoMatch
//!
//! Policy tables (at startup):
//!     pattern → handler pairs
//!     → matcher.rs (compile into exact / prefix / regex buckets)
//!     → Freeze as immutable PathMatcher
//! ```
//!
//! # Design Decisions
//! - Routes and tables compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same rule
//! - Ties on match length keep the first declared rule

pub mod matcher;
pub mod resource;
pub mod router;

pub use matcher::{MatchEntry, MatchKind, PathMatcher, Pattern, PatternError};
pub use resource::Resource;
pub use router::{ProxyRule, RouteTable, Upstream};
