//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, addresses parse)
//! - Check the upstream origin is a plain HTTP origin
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PortalConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::PortalConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("upstream.origin '{0}' is not a valid URL")]
    UpstreamUrl(String),

    #[error("upstream.origin scheme '{0}' is not supported (only http)")]
    UpstreamScheme(String),

    #[error("terminal.shell must not be empty")]
    EmptyShell,

    #[error("terminal.read_buffer_bytes must be greater than zero")]
    ReadBuffer,

    #[error("auth.token must not be empty when set")]
    EmptyToken,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    match Url::parse(&config.upstream.origin) {
        Ok(url) if url.scheme() != "http" => {
            errors.push(ValidationError::UpstreamScheme(url.scheme().to_string()));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::UpstreamUrl(config.upstream.origin.clone()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::UpstreamUrl(config.upstream.origin.clone())),
    }

    if config.terminal.shell.trim().is_empty() {
        errors.push(ValidationError::EmptyShell);
    }
    if config.terminal.read_buffer_bytes == 0 {
        errors.push(ValidationError::ReadBuffer);
    }

    if matches!(config.auth.token.as_deref(), Some(t) if t.is_empty()) {
        errors.push(ValidationError::EmptyToken);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
