//! Server-rendered web frontend.
//!
//! # Data Flow
//! ```text
//! GET /weather
//!     → client.rs WeatherApiClient (https+http://apiservice, resilient client)
//!     → stream.rs (array elements decoded as they arrive, stop at max items)
//!     → pages.rs (HTML table)
//! ```
//!
//! # Design Decisions
//! - Outside Development failures render a generic error page and responses carry HSTS
//! - In Development the error page shows the failure
//! - Panics render the same error page instead of problem details

pub mod client;
pub mod pages;
pub mod stream;

use std::any::Any;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{Environment, ServiceConfig};
use crate::defaults::StartupContext;
use crate::http::{current_request_id, log_panic, request_id, HttpServer};
use crate::lifecycle::ShutdownSignal;

pub use client::{ClientError, WeatherApiClient, API_BASE_ADDRESS, DEFAULT_MAX_ITEMS};

pub const SERVICE_NAME: &str = "webfrontend";

/// HSTS max-age: 30 days.
const HSTS_VALUE: &str = "max-age=2592000";

/// Failures while assembling the frontend.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Clone)]
pub struct WebState {
    client: WeatherApiClient,
    environment: Environment,
}

impl WebState {
    pub fn new(client: WeatherApiClient, environment: Environment) -> Self {
        Self {
            client,
            environment,
        }
    }
}

async fn home() -> Html<String> {
    Html(pages::home_page())
}

async fn weather(State(state): State<WebState>) -> Response {
    match state
        .client
        .get_forecasts(DEFAULT_MAX_ITEMS, &CancellationToken::new())
        .await
    {
        Ok(forecasts) => Html(pages::weather_page(&forecasts)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load forecasts");
            let detail = state.environment.is_development().then(|| e.to_string());
            error_response(current_request_id().as_deref(), detail.as_deref())
        }
    }
}

async fn error_route(headers: HeaderMap) -> Response {
    error_response(request_id(&headers), None)
}

/// Panics render the generic error page, never the panic payload.
fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    log_panic(panic.as_ref());
    error_response(current_request_id().as_deref(), None)
}

fn error_response(request_id: Option<&str>, detail: Option<&str>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(pages::error_page(request_id, detail)),
    )
        .into_response()
}

/// Frontend routes, without defaults.
pub fn routes(state: WebState) -> Router {
    let production = !state.environment.is_development();
    let router = Router::new()
        .route("/", get(home))
        .route("/weather", get(weather))
        .route("/error", get(error_route))
        .with_state(state);

    if production {
        router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        ))
    } else {
        router
    }
}

/// Apply the service defaults and build the full router.
pub fn build(config: ServiceConfig) -> Result<Router, FrontendError> {
    let mut ctx = StartupContext::new(config);
    ctx.apply_service_defaults();

    let client = WeatherApiClient::with_logical_address(ctx.http_client()?)?;
    let state = WebState::new(client, ctx.environment().clone());
    Ok(ctx.finish_router_with_panic_handler(routes(state), render_panic))
}

/// Serve the frontend on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    config: ServiceConfig,
    shutdown: ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let name = config.service_name.clone();
    let router = build(config)?;
    HttpServer::new(name, router).run(listener, shutdown).await?;
    Ok(())
}
