//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID) when the caller sent none
//! - Echo the ID on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning an ID to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request ID carried by a header map, if any.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: String;
}

/// Axum middleware exposing the request ID to code running for the request.
pub async fn scope_request_id(req: Request, next: Next) -> Response {
    match request_id(req.headers()).map(str::to_owned) {
        Some(id) => CURRENT_REQUEST_ID.scope(id, next.run(req)).await,
        None => next.run(req).await,
    }
}

/// ID of the request being processed on this task.
pub fn current_request_id() -> Option<String> {
    CURRENT_REQUEST_ID.try_with(Clone::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_id_generated_and_echoed() {
        let app = Router::new()
            .route("/", get(|| async { current_request_id().unwrap_or_default() }))
            .layer(axum::middleware::from_fn(scope_request_id))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let response = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let header = request_id(response.headers()).unwrap().to_owned();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, header.as_bytes());
        assert_eq!(header.len(), 36);
    }

    #[tokio::test]
    async fn test_caller_id_is_kept() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let response = app
            .oneshot(
                axum::http::Request::get("/")
                    .header(X_REQUEST_ID, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(request_id(response.headers()), Some("abc-123"));
    }

    #[test]
    fn test_no_id_outside_request() {
        assert!(current_request_id().is_none());
    }
}
