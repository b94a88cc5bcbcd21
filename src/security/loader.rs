//! Policy file loading.
//!
//! A policy file is a JSON object mapping patterns to policy objects:
//!
//! ```json
//! {
//!     "/": { "allow_origin": "*" },
//!     "= /login": { "allow_origin": "https://app.example.com", "allow_credentials": true },
//!     "*~ \\.js$": { "max_age": 600 }
//! }
//! ```
//!
//! Key order is kept, so equal-length ties resolve to the entry written first.
//! A handler that is not an object, or a pattern that does not compile, fails
//! the whole file; fields of the wrong type inside a policy are skipped.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::security::policy::{constant, Handler, PolicyError};

/// Load a pattern table from `path`.
pub fn load_table<P>(path: &Path) -> Result<Handler<P>, PolicyError>
where
    P: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: display.clone(),
        source,
    })?;
    parse_table(&display, &content)
}

/// Parse a pattern table from JSON text; `origin` names the source in errors.
pub fn parse_table<P>(origin: &str, content: &str) -> Result<Handler<P>, PolicyError>
where
    P: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let value: Value = serde_json::from_str(content).map_err(|source| PolicyError::Json {
        path: origin.to_string(),
        source,
    })?;

    let Value::Object(entries) = value else {
        return Err(PolicyError::NotATable {
            path: origin.to_string(),
        });
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (pattern, policy) in entries {
        if !policy.is_object() {
            return Err(PolicyError::InvalidHandler { pattern });
        }
        let policy: P = serde_json::from_value(policy).map_err(|source| PolicyError::InvalidPolicy {
            pattern: pattern.clone(),
            source,
        })?;
        rules.push((pattern, constant(policy)));
    }

    Ok(Handler::table(rules)?)
}
