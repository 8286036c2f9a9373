//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Propagate trace context to outbound requests
//! - Create spans for inbound requests, except probe traffic
//!
//! # Design Decisions
//! - W3C Trace Context headers
//! - Requests to `/health` and `/alive` (and anything beneath them) get no span

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use opentelemetry::{
    global,
    propagation::{Extractor, Injector},
    Context,
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer},
};
use tracing::{field::Empty, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::health::{ALIVENESS_ENDPOINT_PATH, HEALTH_ENDPOINT_PATH};

const EXCLUDED_PATHS: [&str; 2] = [HEALTH_ENDPOINT_PATH, ALIVENESS_ENDPOINT_PATH];

/// Whether an inbound request path is traced.
///
/// `/health` and `/health/ready` are excluded, `/healthz` is not.
pub fn should_trace(path: &str) -> bool {
    !EXCLUDED_PATHS.iter().any(|excluded| {
        path.strip_prefix(excluded)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Writes propagation fields into outbound headers.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Reads propagation fields from inbound headers.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Remote parent context carried by inbound headers.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Write the context of `span` into outbound headers.
pub fn inject_context(span: &Span, headers: &mut HeaderMap) {
    let cx = span.context();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderInjector(headers))
    });
}

/// Span factory that skips probe traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeAwareMakeSpan;

impl<B> MakeSpan<B> for ProbeAwareMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let path = request.uri().path();
        if !should_trace(path) {
            return Span::none();
        }

        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let span = tracing::info_span!(
            "http_request",
            otel.name = %format!("{} {}", request.method(), path),
            otel.kind = "server",
            http.request.method = %request.method(),
            url.path = %path,
            request_id = %request_id,
            http.response.status_code = Empty,
        );
        let _ = span.set_parent(extract_context(request.headers()));
        span
    }
}

/// Response logger that stays quiet for untraced requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeAwareOnResponse;

impl<B> OnResponse<B> for ProbeAwareOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        if span.is_none() {
            return;
        }
        span.record("http.response.status_code", response.status().as_u16());
        tracing::info!(
            parent: span,
            status = response.status().as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Request completed"
        );
    }
}

pub type InboundTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    ProbeAwareMakeSpan,
    DefaultOnRequest,
    ProbeAwareOnResponse,
>;

/// Inbound trace layer with probe exclusion.
pub fn trace_layer() -> InboundTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(ProbeAwareMakeSpan)
        .on_response(ProbeAwareOnResponse)
}
