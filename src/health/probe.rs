//! HTTP health probing of a running unit.
//!
//! # Responsibilities
//! - Probe a unit's health path over plain HTTP
//! - Poll until the unit reports healthy or a deadline passes

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{self, Instant};

use crate::resilience::backoff::calculate_backoff;

/// Outcome of waiting on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy { attempts: u32 },
    TimedOut { attempts: u32 },
}

/// Probes a unit's health endpoint.
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    request_timeout: Duration,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            path: path.into(),
            request_timeout: Duration::from_secs(5),
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }

    /// Override the backoff applied between probes.
    pub fn with_backoff(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Probe once. Any 2xx answer counts as healthy.
    pub async fn check(&self, addr: SocketAddr) -> bool {
        let uri = format!("http://{}{}", addr, self.path);

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "family-copilot-apphost")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build health probe request: {}", e);
                return false;
            }
        };

        match time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(addr = %addr, status = %response.status(), "Health probe: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %addr, error = %e, "Health probe: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %addr, "Health probe: timeout");
                false
            }
        }
    }

    /// Poll until the unit is healthy or `timeout` elapses.
    pub async fn wait_until_healthy(&self, addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let deadline = Instant::now() + timeout;
        let mut attempts = 0;

        loop {
            attempts += 1;
            if self.check(addr).await {
                return ProbeOutcome::Healthy { attempts };
            }

            let delay = calculate_backoff(attempts, self.base_delay_ms, self.max_delay_ms);
            if Instant::now() + delay >= deadline {
                return ProbeOutcome::TimedOut { attempts };
            }
            time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn spawn(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_waits_until_healthy() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let addr = spawn(Router::new().route(
            "/health",
            get(move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        ))
        .await;

        let probe = HttpProbe::new("/health").with_backoff(10, 50);
        let outcome = probe.wait_until_healthy(addr, Duration::from_secs(5)).await;
        assert_eq!(outcome, ProbeOutcome::Healthy { attempts: 3 });
    }

    #[tokio::test]
    async fn test_missing_route_times_out() {
        let addr = spawn(Router::new()).await;

        let probe = HttpProbe::new("/health").with_backoff(10, 20);
        let outcome = probe.wait_until_healthy(addr, Duration::from_millis(200)).await;
        assert!(matches!(outcome, ProbeOutcome::TimedOut { .. }));
    }
}
