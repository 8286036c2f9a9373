//! Configuration schema definitions.
//!
//! This module defines the configuration shared by every service in the
//! composition. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the environment classification.
pub const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Environment variable enabling OTLP export when set and non-blank.
pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Environment variable overriding the reported service name.
pub const SERVICE_NAME_VAR: &str = "OTEL_SERVICE_NAME";

/// Environment classification of a running service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
    Other(String),
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
            Environment::Other(name) => name,
        }
    }

    /// Read the classification from `APP_ENVIRONMENT`, if present.
    pub fn from_env() -> Option<Self> {
        std::env::var(ENVIRONMENT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse().unwrap_or(Environment::Production))
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            _ => Environment::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Environment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// Root configuration for a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Logical service name, used for telemetry and discovery.
    pub service_name: String,

    /// Environment classification.
    pub environment: Environment,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Inbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging, tracing and metrics export.
    pub telemetry: TelemetryConfig,

    /// Defaults applied to outbound HTTP clients.
    pub http_client: HttpClientConfig,

    /// Known service endpoints: service name -> scheme -> endpoint URLs.
    pub services: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            environment: Environment::default(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            telemetry: TelemetryConfig::default(),
            http_client: HttpClientConfig::default(),
            services: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Defaults for a named service.
    pub fn named(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Register an endpoint for a logical service under the given scheme.
    pub fn add_service_endpoint(&mut self, service: &str, scheme: &str, endpoint: impl Into<String>) {
        self.services
            .entry(service.to_string())
            .or_default()
            .entry(scheme.to_string())
            .or_default()
            .push(endpoint.into());
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Inbound request timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed to produce a response, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// OTLP collector endpoint. Export is disabled when unset or blank.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl TelemetryConfig {
    /// The collector endpoint, if export is enabled.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// Outbound HTTP client defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Standard resilience pipeline settings.
    pub resilience: ResilienceConfig,

    /// Service discovery settings.
    pub discovery: DiscoveryConfig,
}

/// Settings of the standard resilience pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Deadline for a request including all retries, in seconds.
    pub total_timeout_secs: u64,

    /// Deadline for a single attempt, in seconds.
    pub attempt_timeout_secs: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Failure ratio within the sampling window that opens the circuit.
    pub breaker_failure_ratio: f64,

    /// Minimum attempts within the sampling window before the ratio applies.
    pub breaker_min_throughput: u32,

    /// Length of the sampling window in seconds.
    pub breaker_sampling_secs: u64,

    /// How long the circuit stays open, in seconds.
    pub breaker_break_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            total_timeout_secs: 30,
            attempt_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            retry_max_delay_ms: 30_000,
            breaker_failure_ratio: 0.1,
            breaker_min_throughput: 100,
            breaker_sampling_secs: 30,
            breaker_break_secs: 5,
        }
    }
}

/// Service discovery settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Schemes discovery may resolve to. Empty allows all.
    pub allowed_schemes: Vec<String>,
}
