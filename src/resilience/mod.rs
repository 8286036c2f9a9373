//! Resilience subsystem for outbound HTTP.
//!
//! # Data Flow
//! ```text
//! Outbound request (outermost first):
//!     → timeouts.rs TotalTimeout (whole request, retries included)
//!     → retries.rs (reqwest_retry over transient outcomes of safe methods)
//!     → service discovery (logical name → endpoint)
//!     → circuit_breaker.rs (fail fast while an endpoint is broken)
//!     → timeouts.rs AttemptTimeout (single attempt)
//!     → transport
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - Discovery runs inside the retry loop so each attempt may pick another endpoint
//! - Circuit breaker prevents cascading failures
//! - All resilience logic is composable middleware

use std::time::Duration;

use thiserror::Error;

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitStatus};
pub use retries::{
    backoff_policy, is_retryable, is_safe_method, is_transient_error, is_transient_status, Retry,
    TransientStrategy,
};
pub use timeouts::{AttemptTimeout, TotalTimeout};

/// Failures raised by the resilience layers themselves.
#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("circuit for {authority} is open, retry after {retry_after:?}")]
    CircuitOpen {
        authority: String,
        retry_after: Duration,
    },

    #[error("request exceeded total timeout of {0:?}")]
    TotalTimeout(Duration),
}
