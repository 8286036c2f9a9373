//! RFC 9457 problem details for unhandled failures.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde::Serialize;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::http::request::current_request_id;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const INTERNAL_ERROR_TYPE: &str = "https://tools.ietf.org/html/rfc9110#section-15.6.1";
const INTERNAL_ERROR_TITLE: &str = "An error occurred while processing your request.";

/// Problem details body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ProblemDetails {
    /// Generic 500 problem. Never carries internal error text.
    pub fn internal_error() -> Self {
        Self {
            kind: INTERNAL_ERROR_TYPE.to_string(),
            title: INTERNAL_ERROR_TITLE.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: None,
            trace_id: current_trace_id(),
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(_) => b"{}".to_vec(),
        };
        (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE))],
            body,
        )
            .into_response()
    }
}

/// Trace id of the active request span, falling back to the request ID.
fn current_trace_id() -> Option<String> {
    let cx = tracing::Span::current().context();
    let span_context = cx.span().span_context().clone();
    if span_context.is_valid() {
        return Some(span_context.trace_id().to_string());
    }
    current_request_id()
}

/// Panic handler for `CatchPanicLayer::custom`.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    log_panic(panic.as_ref());
    ProblemDetails::internal_error().into_response()
}

/// Log a caught panic payload. The payload never reaches the client.
pub fn log_panic(panic: &(dyn Any + Send)) {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %message, "Unhandled failure while processing request");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_panic_maps_to_problem() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["type"], INTERNAL_ERROR_TYPE);
        assert_eq!(json["title"], INTERNAL_ERROR_TITLE);
        assert_eq!(json["status"], 500);
        assert!(json.get("detail").is_none());
        assert!(!body.windows(4).any(|w| w == b"boom"));
    }
}
