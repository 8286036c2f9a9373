//! HTTP probe routes.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::health::registry::{HealthCheckRegistry, HealthReport, HealthStatus, LIVE_TAG};

/// Readiness route: every registered check must pass.
pub const HEALTH_ENDPOINT_PATH: &str = "/health";

/// Liveness route: only checks tagged `live` must pass.
pub const ALIVENESS_ENDPOINT_PATH: &str = "/alive";

/// Router serving both probe routes.
pub fn probe_routes(registry: HealthCheckRegistry) -> Router {
    Router::new()
        .route(HEALTH_ENDPOINT_PATH, get(readiness))
        .route(ALIVENESS_ENDPOINT_PATH, get(liveness))
        .with_state(Arc::new(registry))
}

async fn readiness(State(registry): State<Arc<HealthCheckRegistry>>) -> Response {
    let report = registry.evaluate(|_| true).await;
    report_response(&report)
}

async fn liveness(State(registry): State<Arc<HealthCheckRegistry>>) -> Response {
    let report = registry.evaluate(|r| r.has_tag(LIVE_TAG)).await;
    report_response(&report)
}

/// Status code for a report: degraded still accepts traffic.
pub fn status_code_for(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn report_response(report: &HealthReport) -> Response {
    tracing::debug!(
        status = %report.status,
        checks = report.entries.len(),
        elapsed_ms = report.total_duration.as_millis() as u64,
        "Health report"
    );

    (
        status_code_for(report.status),
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache"),
            ),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (
                header::EXPIRES,
                HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"),
            ),
        ],
        report.status.as_str(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::registry::HealthCheckResult;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_readiness_fails_while_liveness_passes() {
        let mut registry = HealthCheckRegistry::new();
        registry
            .add_fn("self", HealthCheckResult::healthy, &[LIVE_TAG])
            .add_fn("database", || HealthCheckResult::unhealthy("unreachable"), &[]);
        let router = probe_routes(registry);

        assert_eq!(
            get(router.clone(), HEALTH_ENDPOINT_PATH).await,
            (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy".to_string())
        );
        assert_eq!(
            get(router, ALIVENESS_ENDPOINT_PATH).await,
            (StatusCode::OK, "Healthy".to_string())
        );
    }

    #[tokio::test]
    async fn test_degraded_is_ok() {
        let mut registry = HealthCheckRegistry::new();
        registry.add_fn("cache", || HealthCheckResult::degraded("cold"), &[]);

        assert_eq!(
            get(probe_routes(registry), HEALTH_ENDPOINT_PATH).await,
            (StatusCode::OK, "Degraded".to_string())
        );
    }

    #[tokio::test]
    async fn test_probe_responses_are_not_cached() {
        let response = probe_routes(HealthCheckRegistry::new())
            .oneshot(Request::get(ALIVENESS_ENDPOINT_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store, no-cache"
        );
    }
}
