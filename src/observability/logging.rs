//! Structured logging.
//!
//! # Responsibilities
//! - Build the level filter from config or `RUST_LOG`
//! - Pick the console format for the environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format outside development, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing::Subscriber;
use tracing_subscriber::{fmt, registry::LookupSpan, EnvFilter, Layer};

use crate::config::Environment;

/// Noisy transport crates kept at warn unless `RUST_LOG` says otherwise.
const QUIET_DIRECTIVES: &str = "hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,opentelemetry=warn";

/// Level filter for the console and the log exporter.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},{QUIET_DIRECTIVES}")))
}

/// Console output layer for the environment.
pub fn console_layer<S>(environment: &Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if environment.is_development() {
        fmt::layer().pretty().with_target(true).boxed()
    } else {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    }
}

