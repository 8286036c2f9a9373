//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{
    Environment, ServiceConfig, ENVIRONMENT_VAR, OTLP_ENDPOINT_VAR, SERVICE_NAME_VAR,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the configuration for a service.
///
/// Starts from the file when one is given, otherwise from the defaults for
/// `service_name`, then applies the process environment and validates.
pub fn resolve_config(path: Option<&Path>, service_name: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::named(service_name),
    };

    apply_env_overrides(&mut config, std::env::vars());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides to a configuration.
///
/// Recognized variables: `APP_ENVIRONMENT`, `OTEL_EXPORTER_OTLP_ENDPOINT`,
/// `OTEL_SERVICE_NAME` and discovery entries of the form
/// `services__<name>__<scheme>__<index>`.
pub fn apply_env_overrides<I>(config: &mut ServiceConfig, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut discovered: Vec<(String, String, usize, String)> = Vec::new();

    for (key, value) in vars {
        if key == ENVIRONMENT_VAR {
            if !value.trim().is_empty() {
                config.environment = value.parse().unwrap_or(Environment::Production);
            }
        } else if key == OTLP_ENDPOINT_VAR {
            config.telemetry.otlp_endpoint = Some(value);
        } else if key == SERVICE_NAME_VAR {
            if !value.trim().is_empty() {
                config.service_name = value;
            }
        } else if let Some(entry) = parse_service_var(&key) {
            discovered.push((entry.0, entry.1, entry.2, value));
        }
    }

    // Index order decides endpoint order within a scheme.
    discovered.sort_by(|a, b| (&a.0, &a.1, a.2).cmp(&(&b.0, &b.1, b.2)));
    for (service, scheme, _, endpoint) in discovered {
        config.add_service_endpoint(&service, &scheme, endpoint);
    }
}

fn parse_service_var(key: &str) -> Option<(String, String, usize)> {
    let mut parts = key.split("__");
    if !parts.next()?.eq_ignore_ascii_case("services") {
        return None;
    }
    let service = parts.next()?.to_ascii_lowercase();
    let scheme = parts.next()?.to_ascii_lowercase();
    let index = parts.next()?.parse().ok()?;
    if parts.next().is_some() || service.is_empty() || scheme.is_empty() {
        return None;
    }
    Some((service, scheme, index))
}
