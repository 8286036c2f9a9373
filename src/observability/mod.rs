//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (histograms, runtime gauges)
//!     → tracing.rs (spans with W3C trace context)
//!
//! Consumers:
//!     → Console (pretty in development, JSON elsewhere)
//!     → OTLP collector, only when an endpoint is configured
//! ```
//!
//! # Design Decisions
//! - Installed once per process; later calls are no-ops
//! - Logs, traces and metrics share one resource (service name, environment)
//! - Export is off unless an OTLP endpoint is set

use std::sync::{Mutex, OnceLock};

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::SdkLoggerProvider, metrics::SdkMeterProvider, propagation::TraceContextPropagator,
    trace::SdkTracerProvider, Resource,
};
use thiserror::Error;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{Environment, ServiceConfig};

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{register_runtime_gauges, track_http_metrics, OutboundTelemetry};
pub use self::tracing::{should_trace, trace_layer};

/// Errors raised while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// What telemetry needs to know about the running service.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub service_name: String,
    pub environment: Environment,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl From<&ServiceConfig> for TelemetrySettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            environment: config.environment.clone(),
            log_level: config.telemetry.log_level.clone(),
            otlp_endpoint: config.telemetry.export_endpoint().map(str::to_owned),
        }
    }
}

#[derive(Default)]
struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
    logger: Option<SdkLoggerProvider>,
}

static INSTALLED: OnceLock<Mutex<Providers>> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<tracing_subscriber::layer::Layered<EnvFilter, Registry>> + Send + Sync>;

fn signal_endpoint(base: &str, signal: &str) -> String {
    format!("{}/v1/{}", base.trim_end_matches('/'), signal)
}

fn resource(settings: &TelemetrySettings) -> Resource {
    Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attribute(KeyValue::new(
            "deployment.environment.name",
            settings.environment.as_str().to_owned(),
        ))
        .build()
}

fn build_providers(settings: &TelemetrySettings, endpoint: &str) -> Result<Providers, TelemetryError> {
    let resource = resource(settings);

    let spans = SpanExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(endpoint, "traces"))
        .build()?;
    let tracer = SdkTracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(spans)
        .build();

    let metrics = MetricExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(endpoint, "metrics"))
        .build()?;
    let meter = SdkMeterProvider::builder()
        .with_resource(resource.clone())
        .with_periodic_exporter(metrics)
        .build();

    let logs = LogExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(endpoint, "logs"))
        .build()?;
    let logger = SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(logs)
        .build();

    Ok(Providers {
        tracer: Some(tracer),
        meter: Some(meter),
        logger: Some(logger),
    })
}

/// Install logging, tracing and metrics for the process.
///
/// Only the first call has an effect. If another global subscriber is
/// already installed the console layers are skipped.
pub fn init_telemetry(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        ::tracing::debug!(service = %settings.service_name, "Telemetry already installed");
        return Ok(());
    }

    global::set_text_map_propagator(TraceContextPropagator::new());

    let providers = match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => build_providers(settings, endpoint)?,
        None => Providers::default(),
    };

    let mut layers: Vec<BoxedLayer> = vec![logging::console_layer(&settings.environment)];
    if let Some(tracer) = &providers.tracer {
        global::set_tracer_provider(tracer.clone());
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(tracer.tracer(settings.service_name.clone()))
                .boxed(),
        );
    }
    if let Some(meter) = &providers.meter {
        global::set_meter_provider(meter.clone());
    }
    if let Some(logger) = &providers.logger {
        // The exporter's own transport must not feed back into it.
        let filter = EnvFilter::new("info,hyper=off,hyper_util=off,h2=off,reqwest=off,opentelemetry=off");
        layers.push(OpenTelemetryTracingBridge::new(logger).with_filter(filter).boxed());
    }

    let installed = tracing_subscriber::registry()
        .with(logging::env_filter(&settings.log_level))
        .with(layers)
        .try_init()
        .is_ok();

    let exporting = settings.otlp_endpoint.is_some();
    if INSTALLED.set(Mutex::new(providers)).is_err() {
        return Ok(());
    }
    register_runtime_gauges();

    ::tracing::info!(
        service = %settings.service_name,
        environment = %settings.environment,
        otlp_export = exporting,
        subscriber_installed = installed,
        "Telemetry configured"
    );
    Ok(())
}

/// Flush and stop exporters. Safe to call when nothing was installed.
pub fn shutdown_telemetry() {
    let Some(lock) = INSTALLED.get() else {
        return;
    };
    let Ok(mut providers) = lock.lock() else {
        return;
    };

    if let Some(tracer) = providers.tracer.take() {
        if let Err(e) = tracer.shutdown() {
            ::tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
    }
    if let Some(meter) = providers.meter.take() {
        if let Err(e) = meter.shutdown() {
            ::tracing::warn!(error = %e, "Failed to shut down meter provider");
        }
    }
    if let Some(logger) = providers.logger.take() {
        if let Err(e) = logger.shutdown() {
            ::tracing::warn!(error = %e, "Failed to shut down logger provider");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_endpoints() {
        assert_eq!(
            signal_endpoint("http://localhost:4318/", "traces"),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://collector:4318", "logs"),
            "http://collector:4318/v1/logs"
        );
    }

    #[test]
    fn test_settings_ignore_blank_endpoint() {
        let mut config = ServiceConfig::named("apiservice");
        config.telemetry.otlp_endpoint = Some("  ".to_string());
        assert!(TelemetrySettings::from(&config).otlp_endpoint.is_none());
    }

    #[tokio::test]
    async fn test_init_without_endpoint_is_idempotent() {
        let settings = TelemetrySettings::from(&ServiceConfig::named("apiservice"));
        assert!(init_telemetry(&settings).is_ok());
        assert!(init_telemetry(&settings).is_ok());
        shutdown_telemetry();
    }
}
