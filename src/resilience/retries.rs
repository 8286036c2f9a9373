//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (safe methods only)
//! - Re-send transient failures with exponential backoff + jitter
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH
//! - 408, 429 and every 5xx are transient
//! - Connection errors and per-attempt timeouts are transient
//! - Errors raised by other middleware (open circuit, total timeout) end the loop
//! - The retry loop itself is `reqwest_retry`; this module only decides what to retry

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Extensions, Method, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use reqwest_retry::{
    policies::ExponentialBackoff, Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy,
};

use crate::config::ResilienceConfig;

/// Whether a status warrants another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Whether a transport error warrants another attempt.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Methods that may be sent more than once.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Whether an outcome of `method` may be retried.
pub fn is_retryable(method: &Method, status: Option<StatusCode>, network_error: bool) -> bool {
    is_safe_method(method) && (network_error || status.is_some_and(is_transient_status))
}

/// Classifies attempt outcomes for [`RetryTransientMiddleware`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientStrategy;

impl RetryableStrategy for TransientStrategy {
    fn handle(&self, res: &Result<Response>) -> Option<Retryable> {
        match res {
            Ok(response) if is_transient_status(response.status()) => Some(Retryable::Transient),
            Ok(_) => None,
            Err(reqwest_middleware::Error::Reqwest(e)) if is_transient_error(e) => {
                Some(Retryable::Transient)
            }
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// Backoff policy for the configured attempt count and delay bounds.
pub fn backoff_policy(config: &ResilienceConfig) -> ExponentialBackoff {
    let min = Duration::from_millis(config.retry_base_delay_ms);
    let max = Duration::from_millis(config.retry_max_delay_ms.max(config.retry_base_delay_ms));
    ExponentialBackoff::builder()
        .retry_bounds(min, max)
        .jitter(Jitter::Bounded)
        .build_with_max_retries(config.max_retries)
}

/// Retry middleware. Unsafe methods pass straight through.
pub struct Retry {
    inner: RetryTransientMiddleware<ExponentialBackoff, TransientStrategy>,
}

impl From<&ResilienceConfig> for Retry {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            inner: RetryTransientMiddleware::new_with_policy_and_strategy(
                backoff_policy(config),
                TransientStrategy,
            ),
        }
    }
}

#[async_trait]
impl Middleware for Retry {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        if !is_safe_method(req.method()) {
            return next.run(req, extensions).await;
        }
        self.inner.handle(req, extensions, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest_retry::{RetryDecision, RetryPolicy};
    use std::time::SystemTime;

    fn response(status: u16) -> Response {
        let inner = axum::http::Response::builder()
            .status(status)
            .body(Vec::<u8>::new())
            .unwrap();
        Response::from(inner)
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::OK));
    }

    #[test]
    fn test_only_safe_methods_retry() {
        let unavailable = Some(StatusCode::SERVICE_UNAVAILABLE);
        assert!(is_retryable(&Method::GET, unavailable, false));
        assert!(is_retryable(&Method::HEAD, None, true));
        assert!(!is_retryable(&Method::POST, unavailable, false));
        assert!(!is_retryable(&Method::DELETE, None, true));
        assert!(!is_retryable(&Method::GET, Some(StatusCode::BAD_REQUEST), false));
    }

    #[test]
    fn test_strategy_classification() {
        let strategy = TransientStrategy;
        assert!(matches!(
            strategy.handle(&Ok(response(503))),
            Some(Retryable::Transient)
        ));
        assert!(matches!(
            strategy.handle(&Ok(response(429))),
            Some(Retryable::Transient)
        ));
        assert!(strategy.handle(&Ok(response(404))).is_none());
        assert!(strategy.handle(&Ok(response(200))).is_none());
    }

    #[test]
    fn test_middleware_errors_end_the_loop() {
        let error = reqwest_middleware::Error::middleware(std::io::Error::other("circuit open"));
        assert!(matches!(
            TransientStrategy.handle(&Err(error)),
            Some(Retryable::Fatal)
        ));
    }

    #[test]
    fn test_policy_attempt_limit() {
        let config = ResilienceConfig {
            max_retries: 2,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 100,
            ..ResilienceConfig::default()
        };
        let policy = backoff_policy(&config);
        let start = SystemTime::now();
        assert!(matches!(
            policy.should_retry(start, 0),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(start, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(start, 2),
            RetryDecision::DoNotRetry
        ));

        let none = backoff_policy(&ResilienceConfig {
            max_retries: 0,
            ..config
        });
        assert!(matches!(none.should_retry(start, 0), RetryDecision::DoNotRetry));
    }

    #[test]
    fn test_inverted_delays_do_not_panic() {
        let config = ResilienceConfig {
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 100,
            ..ResilienceConfig::default()
        };
        let policy = backoff_policy(&config);
        assert_eq!(policy.max_n_retries, Some(config.max_retries));
        assert!(policy.max_retry_interval >= policy.min_retry_interval);
    }
}
