//! Shared service defaults.
//!
//! # Data Flow
//! ```text
//! ServiceConfig
//!     → StartupContext
//!         configure_telemetry            → logging, tracing, metrics (once per process)
//!         add_default_health_checks      → "self" check tagged live
//!         add_service_discovery          → registry from the services section
//!         configure_http_client_defaults → resilience + discovery on new clients
//!     → map_default_endpoints(router)    → /health, /alive (Development only)
//! ```
//!
//! # Design Decisions
//! - Every step is recorded; a repeated step is a no-op
//! - Steps only record intent, so any application order gives the same context
//! - Steps never fail; problems are logged and the service keeps starting

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{body::Body, http::Response, Router};
use reqwest_middleware::ClientWithMiddleware;

use crate::config::{Environment, ServiceConfig};
use crate::discovery::{ServiceRegistry, ServiceResolver};
use crate::health::{probe_routes, HealthCheckRegistry, HealthCheckResult, LIVE_TAG};
use crate::http::{
    build_http_client, with_common_layers, with_common_layers_and_panic_handler, HttpClientDefaults,
};
use crate::observability::{init_telemetry, TelemetrySettings};

/// Name of the default liveness check.
pub const SELF_CHECK_NAME: &str = "self";

/// A configuration step of the shared defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefaultsStep {
    Telemetry,
    HealthChecks,
    ServiceDiscovery,
    HttpClientDefaults,
}

/// Mutable startup state of one service.
pub struct StartupContext {
    config: ServiceConfig,
    health: HealthCheckRegistry,
    registry: Option<Arc<ServiceRegistry>>,
    applied: BTreeSet<DefaultsStep>,
}

impl StartupContext {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            health: HealthCheckRegistry::new(),
            registry: None,
            applied: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.config.environment
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn health(&self) -> &HealthCheckRegistry {
        &self.health
    }

    /// Register additional checks.
    pub fn health_mut(&mut self) -> &mut HealthCheckRegistry {
        &mut self.health
    }

    pub fn is_applied(&self, step: DefaultsStep) -> bool {
        self.applied.contains(&step)
    }

    pub fn applied_steps(&self) -> impl Iterator<Item = DefaultsStep> + '_ {
        self.applied.iter().copied()
    }

    /// The discovery registry, once discovery is enabled.
    pub fn service_registry(&self) -> Option<Arc<ServiceRegistry>> {
        self.registry.clone()
    }

    /// Mark `step` applied. Returns false if it already was.
    fn begin(&mut self, step: DefaultsStep) -> bool {
        let first = self.applied.insert(step);
        if !first {
            tracing::debug!(service = %self.config.service_name, step = ?step, "Defaults step already applied");
        }
        first
    }

    /// Telemetry, health checks, discovery and client defaults.
    pub fn apply_service_defaults(&mut self) -> &mut Self {
        self.configure_telemetry()
            .add_default_health_checks()
            .add_service_discovery()
            .configure_http_client_defaults()
    }

    /// Structured logging, tracing and metrics, exported over OTLP when configured.
    pub fn configure_telemetry(&mut self) -> &mut Self {
        if !self.begin(DefaultsStep::Telemetry) {
            return self;
        }
        if let Err(e) = init_telemetry(&TelemetrySettings::from(&self.config)) {
            tracing::warn!(service = %self.config.service_name, error = %e, "Telemetry export unavailable");
        }
        self
    }

    /// A trivial check tagged `live` that always reports healthy.
    pub fn add_default_health_checks(&mut self) -> &mut Self {
        if !self.begin(DefaultsStep::HealthChecks) {
            return self;
        }
        self.health
            .add_fn(SELF_CHECK_NAME, HealthCheckResult::healthy, &[LIVE_TAG]);
        self
    }

    /// Logical name resolution from the `services` section.
    pub fn add_service_discovery(&mut self) -> &mut Self {
        if !self.begin(DefaultsStep::ServiceDiscovery) {
            return self;
        }
        self.ensure_registry();
        self
    }

    /// Resilience and discovery for every client built afterwards.
    pub fn configure_http_client_defaults(&mut self) -> &mut Self {
        if !self.begin(DefaultsStep::HttpClientDefaults) {
            return self;
        }
        self.ensure_registry();
        self
    }

    fn ensure_registry(&mut self) {
        if self.registry.is_some() {
            return;
        }
        let registry = match ServiceRegistry::from_config(&self.config) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(service = %self.config.service_name, error = %e, "Ignoring invalid service endpoints");
                ServiceRegistry::new(self.config.http_client.discovery.allowed_schemes.clone())
            }
        };
        tracing::debug!(
            service = %self.config.service_name,
            known_services = self.config.services.len(),
            "Service discovery enabled"
        );
        self.registry = Some(Arc::new(registry));
    }

    /// Client defaults implied by the applied steps.
    pub fn http_client_defaults(&self) -> HttpClientDefaults {
        if !self.is_applied(DefaultsStep::HttpClientDefaults) {
            return HttpClientDefaults::default();
        }
        HttpClientDefaults {
            resilience: Some(self.config.http_client.resilience.clone()),
            discovery: self
                .registry
                .clone()
                .map(|r| r as Arc<dyn ServiceResolver>),
        }
    }

    /// Build an outbound client honoring the applied defaults.
    pub fn http_client(&self) -> Result<ClientWithMiddleware, reqwest::Error> {
        build_http_client(&self.http_client_defaults())
    }

    /// Probe routes, in Development only.
    pub fn map_default_endpoints(&self, router: Router) -> Router {
        if !self.config.environment.is_development() {
            tracing::debug!(
                service = %self.config.service_name,
                environment = %self.config.environment,
                "Probe routes not mapped outside Development"
            );
            return router;
        }
        router.merge(probe_routes(self.health.clone()))
    }

    /// Default endpoints plus the common inbound middleware.
    pub fn finish_router(&self, router: Router) -> Router {
        with_common_layers(self.map_default_endpoints(router), &self.config.timeouts)
    }

    /// [`finish_router`](Self::finish_router) with panics rendered by `on_panic`.
    pub fn finish_router_with_panic_handler<H>(&self, router: Router, on_panic: H) -> Router
    where
        H: Fn(Box<dyn Any + Send + 'static>) -> Response<Body> + Clone + Send + Sync + 'static,
    {
        with_common_layers_and_panic_handler(
            self.map_default_endpoints(router),
            &self.config.timeouts,
            on_panic,
        )
    }
}
