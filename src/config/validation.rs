//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that service
//! endpoints are usable URLs. Every violation is reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ServiceConfig;

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a service configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service_name.trim().is_empty() {
        errors.push(ValidationError::new("service_name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if !VALID_LOG_LEVELS.contains(&config.telemetry.log_level.as_str()) {
        errors.push(ValidationError::new(
            "telemetry.log_level",
            format!(
                "'{}' is not one of {}",
                config.telemetry.log_level,
                VALID_LOG_LEVELS.join(", ")
            ),
        ));
    }

    if let Some(endpoint) = config.telemetry.export_endpoint() {
        if Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "telemetry.otlp_endpoint",
                format!("'{endpoint}' is not a URL"),
            ));
        }
    }

    let resilience = &config.http_client.resilience;
    if resilience.total_timeout_secs == 0 || resilience.attempt_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "http_client.resilience",
            "timeouts must be greater than 0",
        ));
    }
    if resilience.attempt_timeout_secs > resilience.total_timeout_secs {
        errors.push(ValidationError::new(
            "http_client.resilience.attempt_timeout_secs",
            "must not exceed total_timeout_secs",
        ));
    }
    if resilience.max_retries > 10 {
        errors.push(ValidationError::new(
            "http_client.resilience.max_retries",
            "cannot exceed 10",
        ));
    }
    if resilience.retry_base_delay_ms > resilience.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "http_client.resilience.retry_base_delay_ms",
            "must not exceed retry_max_delay_ms",
        ));
    }
    if !(resilience.breaker_failure_ratio > 0.0 && resilience.breaker_failure_ratio <= 1.0) {
        errors.push(ValidationError::new(
            "http_client.resilience.breaker_failure_ratio",
            "must be in (0, 1]",
        ));
    }
    if resilience.breaker_sampling_secs == 0 || resilience.breaker_break_secs == 0 {
        errors.push(ValidationError::new(
            "http_client.resilience",
            "circuit breaker durations must be greater than 0",
        ));
    }

    for (service, schemes) in &config.services {
        for (scheme, endpoints) in schemes {
            for endpoint in endpoints {
                match Url::parse(endpoint) {
                    Ok(url) if url.scheme() == scheme && url.has_host() => {}
                    Ok(_) => errors.push(ValidationError::new(
                        format!("services.{service}.{scheme}"),
                        format!("'{endpoint}' does not match scheme '{scheme}'"),
                    )),
                    Err(e) => errors.push(ValidationError::new(
                        format!("services.{service}.{scheme}"),
                        format!("'{endpoint}' is not a URL: {e}"),
                    )),
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.telemetry.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "telemetry.log_level"));
    }

    #[test]
    fn test_service_endpoint_must_match_scheme() {
        let mut config = ServiceConfig::default();
        config.add_service_endpoint("apiservice", "https", "http://localhost:5000");

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "services.apiservice.https");
    }

    #[test]
    fn test_breaker_ratio_range() {
        let mut config = ServiceConfig::default();
        config.http_client.resilience.breaker_failure_ratio = 1.5;
        assert!(validate_config(&config).is_err());
    }
}
