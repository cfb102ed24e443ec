//! Configuration loading from disk and environment.

use std::path::{Path, PathBuf};
use std::fs;
use crate::config::schema::PortalConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, overlay the process
/// environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<PortalConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => PortalConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// Recognized: `PORTAL_TOKEN`, `PORTAL_PORT`, `UPSTREAM_URL` (or its older
/// name `SHELLEY_URL`), `BASE_DIR`, `SHELL`. Empty values are ignored. When
/// both upstream names are set, `UPSTREAM_URL` wins.
pub fn apply_env<F>(config: &mut PortalConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(token) = var("PORTAL_TOKEN") {
        config.auth.token = Some(token);
    }
    if let Some(port) = var("PORTAL_PORT") {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(origin) = var("UPSTREAM_URL").or_else(|| var("SHELLEY_URL")) {
        config.upstream.origin = origin;
    }
    if let Some(dir) = var("BASE_DIR") {
        config.backend.base_dir = PathBuf::from(dir);
    }
    if let Some(shell) = var("SHELL") {
        config.terminal.shell = shell;
    }
}
