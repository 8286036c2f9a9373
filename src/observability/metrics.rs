//! Metrics collection.
//!
//! # Responsibilities
//! - Define HTTP server, HTTP client and runtime instruments
//! - Record inbound requests (axum middleware)
//! - Record and trace outbound requests (reqwest middleware)
//!
//! # Metrics
//! - `http.server.request.duration` (histogram, s): by method, route, status
//! - `http.client.request.duration` (histogram, s): by method, server, status
//! - `process.runtime.tokio.workers` (gauge): runtime worker threads
//! - `process.runtime.tokio.alive_tasks` (gauge): tasks currently alive
//!
//! # Design Decisions
//! - Instruments come from the global meter; they are no-ops until export is enabled

use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request as AxumRequest},
    http::Extensions,
    middleware::Next as AxumNext,
    response::Response as AxumResponse,
};
use opentelemetry::{
    global,
    metrics::{Histogram, ObservableGauge},
    KeyValue,
};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::Instrument;

use crate::observability::tracing::inject_context;

const METER_NAME: &str = "family_copilot";

struct HttpInstruments {
    server_duration: Histogram<f64>,
    client_duration: Histogram<f64>,
}

static HTTP_INSTRUMENTS: OnceLock<HttpInstruments> = OnceLock::new();
static RUNTIME_GAUGES: OnceLock<Vec<ObservableGauge<u64>>> = OnceLock::new();

fn instruments() -> &'static HttpInstruments {
    HTTP_INSTRUMENTS.get_or_init(|| {
        let meter = global::meter(METER_NAME);
        HttpInstruments {
            server_duration: meter
                .f64_histogram("http.server.request.duration")
                .with_unit("s")
                .with_description("Duration of inbound HTTP requests")
                .build(),
            client_duration: meter
                .f64_histogram("http.client.request.duration")
                .with_unit("s")
                .with_description("Duration of outbound HTTP requests")
                .build(),
        }
    })
}

/// Axum middleware recording inbound request durations.
pub async fn track_http_metrics(req: AxumRequest, next: AxumNext) -> AxumResponse {
    let path = req.uri().path().to_owned();
    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned())
        .unwrap_or(path);

    let res = next.run(req).await;

    instruments().server_duration.record(
        start.elapsed().as_secs_f64(),
        &[
            KeyValue::new("http.request.method", method),
            KeyValue::new("http.route", route),
            KeyValue::new("http.response.status_code", i64::from(res.status().as_u16())),
        ],
    );
    res
}

/// Register runtime gauges for the current Tokio runtime. Later calls are ignored.
pub fn register_runtime_gauges() {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("No Tokio runtime, runtime gauges not registered");
        return;
    };

    RUNTIME_GAUGES.get_or_init(|| {
        let meter = global::meter(METER_NAME);
        let workers = handle.clone();
        let tasks = handle;
        vec![
            meter
                .u64_observable_gauge("process.runtime.tokio.workers")
                .with_description("Worker threads of the Tokio runtime")
                .with_callback(move |observer| {
                    observer.observe(workers.metrics().num_workers() as u64, &[])
                })
                .build(),
            meter
                .u64_observable_gauge("process.runtime.tokio.alive_tasks")
                .with_description("Tasks currently alive in the Tokio runtime")
                .with_callback(move |observer| {
                    observer.observe(tasks.metrics().num_alive_tasks() as u64, &[])
                })
                .build(),
        ]
    });
}

/// Innermost outbound middleware: client span, context propagation and duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboundTelemetry;

#[async_trait]
impl Middleware for OutboundTelemetry {
    async fn handle(&self, mut req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        let method = req.method().as_str().to_owned();
        let server = req.url().host_str().unwrap_or_default().to_owned();
        let span = tracing::info_span!(
            "http_client_request",
            otel.name = %method,
            otel.kind = "client",
            http.request.method = %method,
            url.full = %req.url(),
        );
        inject_context(&span, req.headers_mut());

        let start = Instant::now();
        let result = next.run(req, extensions).instrument(span).await;

        let status = match &result {
            Ok(response) => i64::from(response.status().as_u16()),
            Err(e) => {
                tracing::debug!(error = %e, server = %server, "Outbound request failed");
                0
            }
        };
        instruments().client_duration.record(
            start.elapsed().as_secs_f64(),
            &[
                KeyValue::new("http.request.method", method),
                KeyValue::new("server.address", server),
                KeyValue::new("http.response.status_code", status),
            ],
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_middleware_passes_responses_through() {
        let app = Router::new()
            .route("/weatherforecast", get(|| async { "ok" }))
            .route("/alive", get(|| async { "Healthy" }))
            .layer(axum::middleware::from_fn(track_http_metrics));

        for path in ["/weatherforecast", "/alive"] {
            let response = app
                .clone()
                .oneshot(axum::http::Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_runtime_gauges_register_once() {
        register_runtime_gauges();
        register_runtime_gauges();
        assert_eq!(RUNTIME_GAUGES.get().map(Vec::len), Some(2));
    }
}
