//! HTTP server setup.
//!
//! # Responsibilities
//! - Wire up the common middleware stack (request ID, tracing, timeout, metrics, panics)
//! - Bind a router to a listener
//! - Drain in-flight requests on shutdown

use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{body::Body, http::Response, Router};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

use crate::config::TimeoutConfig;
use crate::http::problem;
use crate::http::request::{propagate_request_id_layer, scope_request_id, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::observability::{track_http_metrics, trace_layer};

/// Wrap a router with the middleware every service runs.
///
/// Outermost first: request ID, trace span, timeout, request-ID scope,
/// metrics, panic → problem details.
pub fn with_common_layers(router: Router, timeouts: &TimeoutConfig) -> Router {
    with_common_layers_and_panic_handler(router, timeouts, problem::handle_panic)
}

/// Like [`with_common_layers`], with panics rendered by `on_panic`.
///
/// `on_panic` runs inside the request-ID scope.
#[allow(deprecated)]
pub fn with_common_layers_and_panic_handler<H>(
    router: Router,
    timeouts: &TimeoutConfig,
    on_panic: H,
) -> Router
where
    H: Fn(Box<dyn Any + Send + 'static>) -> Response<Body> + Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(on_panic))
        .layer(axum::middleware::from_fn(track_http_metrics))
        .layer(axum::middleware::from_fn(scope_request_id))
        .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
        .layer(trace_layer())
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

/// HTTP server for one service.
pub struct HttpServer {
    name: String,
    router: Router,
}

impl HttpServer {
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(service = %self.name, address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!(service = %self.name, "HTTP server stopped");
        Ok(())
    }
}
