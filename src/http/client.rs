//! Outbound HTTP client assembly.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use crate::config::ResilienceConfig;
use crate::discovery::{ServiceDiscovery, ServiceResolver};
use crate::observability::OutboundTelemetry;
use crate::resilience::{AttemptTimeout, BreakerSettings, CircuitBreaker, Retry, TotalTimeout};

/// Defaults applied to every client a service creates.
#[derive(Clone, Default)]
pub struct HttpClientDefaults {
    /// Standard resilience pipeline, when enabled.
    pub resilience: Option<ResilienceConfig>,
    /// Logical name resolution, when enabled.
    pub discovery: Option<Arc<dyn ServiceResolver>>,
}

impl fmt::Debug for HttpClientDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientDefaults")
            .field("resilience", &self.resilience)
            .field("discovery", &self.discovery.is_some())
            .finish()
    }
}

/// Build a client with the configured pipeline.
///
/// ```text
/// TotalTimeout → Retry → ServiceDiscovery → CircuitBreaker → AttemptTimeout → OutboundTelemetry → reqwest
/// ```
pub fn build_http_client(defaults: &HttpClientDefaults) -> Result<ClientWithMiddleware, reqwest::Error> {
    let inner = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let mut builder = ClientBuilder::new(inner);

    if let Some(resilience) = &defaults.resilience {
        builder = builder
            .with(TotalTimeout(Duration::from_secs(resilience.total_timeout_secs)))
            .with(Retry::from(resilience));
    }
    if let Some(resolver) = &defaults.discovery {
        builder = builder.with(ServiceDiscovery::new(resolver.clone()));
    }
    if let Some(resilience) = &defaults.resilience {
        builder = builder
            .with(CircuitBreaker::new(BreakerSettings::from(resilience)))
            .with(AttemptTimeout(Duration::from_secs(resilience.attempt_timeout_secs)));
    }

    Ok(builder.with(OutboundTelemetry).build())
}
