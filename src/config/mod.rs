//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, resolve relative paths)
//!     → validation.rs (semantic checks)
//!     → [CLI overrides applied by the binary]
//!     → GatewayConfig (validated, immutable)
//!     → rules.rs (rule URIs → routes, MIME overrides, policy files)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod rules;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use rules::{Rule, RuleError};
pub use schema::{GatewayConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig, TlsConfig};
pub use validation::{validate_config, ValidationError};
