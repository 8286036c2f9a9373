//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → StartupContext (shared defaults) and the service's router
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so a service runs without a file
//! - Environment variables win over the file
//! - Validation reports every violation at once

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, resolve_config, ConfigError};
pub use schema::{
    DiscoveryConfig, Environment, HttpClientConfig, ListenerConfig, ResilienceConfig,
    ServiceConfig, TelemetryConfig, TimeoutConfig, ENVIRONMENT_VAR, OTLP_ENDPOINT_VAR,
    SERVICE_NAME_VAR,
};
