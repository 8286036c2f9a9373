//! Outbound middleware rewriting logical service addresses.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

use crate::discovery::resolver::ServiceResolver;

/// Resolves the request host through a [`ServiceResolver`] on every attempt.
#[derive(Clone)]
pub struct ServiceDiscovery {
    resolver: Arc<dyn ServiceResolver>,
}

impl ServiceDiscovery {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Middleware for ServiceDiscovery {
    async fn handle(&self, mut req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        let resolved = self
            .resolver
            .resolve_url(req.url())
            .map_err(reqwest_middleware::Error::middleware)?;

        if resolved != *req.url() {
            tracing::debug!(logical = %req.url(), resolved = %resolved, "Resolved service address");
            *req.url_mut() = resolved;
        }

        next.run(req, extensions).await
    }
}
