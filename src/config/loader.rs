//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

/// Load and validate configuration from a TOML file.
///
/// Relative paths in the file (listener socket, TLS files, document root and
/// rule paths) resolve against the file's directory.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;

    let base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    resolve_paths(&mut config, &base_dir);

    validate_config(&config)?;

    Ok(config)
}

fn resolve_paths(config: &mut GatewayConfig, base_dir: &Path) {
    if let Some(unix) = config.listener.unix.as_mut() {
        *unix = base_dir.join(&*unix);
    }
    if let Some(tls) = config.listener.tls.as_mut() {
        tls.cert_path = base_dir.join(&tls.cert_path);
        tls.key_path = base_dir.join(&tls.key_path);
    }
    if let Some(root) = config.document_root.as_mut() {
        *root = base_dir.join(&*root);
    }
    config.base_dir = base_dir.to_path_buf();
}
