//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortalConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream service everything unmatched is proxied to.
    pub upstream: UpstreamConfig,

    /// Portal authentication.
    pub auth: AuthConfig,

    /// Remote shell settings.
    pub terminal: TerminalConfig,

    /// File browser settings.
    pub files: FilesConfig,

    /// Upstream binary management.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin URL, e.g. "http://localhost:9001".
    pub origin: String,

    /// Maximum HTML body size buffered for snippet injection.
    pub max_html_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:9001".to_string(),
            max_html_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared portal token. Generated at startup when absent.
    pub token: Option<String>,
}

/// Remote shell configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell executable spawned for each session.
    pub shell: String,

    /// TERM value exported to the shell.
    pub term: String,

    /// Initial pty rows.
    pub rows: u16,

    /// Initial pty columns.
    pub cols: u16,

    /// Maximum bytes read from the pty per outbound message.
    pub read_buffer_bytes: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            term: "xterm-256color".to_string(),
            rows: 24,
            cols: 80,
            read_buffer_bytes: 4096,
        }
    }
}

/// File browser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory all file API paths are resolved against.
    pub root: PathBuf,

    /// Largest file the editor endpoint will return.
    pub max_read_bytes: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
            max_read_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Upstream binary management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Directory holding the upstream binary, its backups and scripts.
    pub base_dir: PathBuf,

    /// Name of the upstream binary inside `base_dir`.
    pub binary_name: String,

    /// `pgrep -f` / `pkill -f` pattern matching the running upstream.
    pub process_pattern: String,

    /// Release API returning JSON with a `tag_name` field.
    pub release_url: String,

    /// Seconds to wait after starting before re-checking.
    pub start_grace_secs: u64,

    /// Seconds to wait after stopping.
    pub stop_grace_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            base_dir,
            binary_name: "shelley".to_string(),
            process_pattern: "shelley.*serve".to_string(),
            release_url: "https://api.github.com/repos/boldsoftware/shelley/releases/latest"
                .to_string(),
            start_grace_secs: 3,
            stop_grace_secs: 2,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Portal API request timeout in seconds.
    pub api_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            api_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
