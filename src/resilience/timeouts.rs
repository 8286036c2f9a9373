//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole logical request, retries included
//! - Bound each individual attempt
//!
//! # Design Decisions
//! - The per-attempt deadline is handed to reqwest so it surfaces as a
//!   transport timeout, which the retry layer treats as transient
//! - The total deadline is a middleware error, which ends retrying

use std::time::Duration;

use async_trait::async_trait;
use axum::http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

use crate::resilience::ResilienceError;

/// Deadline for a request including every retry.
#[derive(Debug, Clone, Copy)]
pub struct TotalTimeout(pub Duration);

#[async_trait]
impl Middleware for TotalTimeout {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        match tokio::time::timeout(self.0, next.run(req, extensions)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.0.as_millis() as u64, "Outbound request timed out");
                Err(reqwest_middleware::Error::middleware(
                    ResilienceError::TotalTimeout(self.0),
                ))
            }
        }
    }
}

/// Deadline for a single attempt. A shorter deadline already on the request wins.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimeout(pub Duration);

#[async_trait]
impl Middleware for AttemptTimeout {
    async fn handle(&self, mut req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        let timeout = match req.timeout() {
            Some(existing) => (*existing).min(self.0),
            None => self.0,
        };
        *req.timeout_mut() = Some(timeout);
        next.run(req, extensions).await
    }
}
