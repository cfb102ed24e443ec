//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, overlay environment)
//!     → validation.rs (semantic checks)
//!     → PortalConfig (validated, immutable)
//!     → shared via Arc to all handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, ConfigError};
pub use schema::PortalConfig;
pub use schema::{
    AuthConfig, BackendConfig, FilesConfig, ListenerConfig, ObservabilityConfig,
    TerminalConfig, TimeoutConfig, UpstreamConfig,
};
