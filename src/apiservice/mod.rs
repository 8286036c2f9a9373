//! Weather forecast API service.
//!
//! # Routes
//! - `GET /weatherforecast`: five random forecasts starting tomorrow
//! - `GET /openapi/v1.json`: OpenAPI document (Development only)
//! - `GET /health`, `GET /alive`: default probes (Development only)

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::defaults::StartupContext;
use crate::forecast::{generate_forecasts, RandomSource, ThreadRandom, WeatherForecast, SUMMARIES};
use crate::http::HttpServer;
use crate::lifecycle::ShutdownSignal;

pub const SERVICE_NAME: &str = "apiservice";
pub const FORECAST_PATH: &str = "/weatherforecast";
pub const OPENAPI_PATH: &str = "/openapi/v1.json";

/// Source of the current local date.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Handler state: the shared random source and the clock.
#[derive(Clone)]
pub struct ApiState {
    rng: Arc<dyn RandomSource>,
    today: Clock,
}

impl ApiState {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            rng,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, today: Clock) -> Self {
        self.today = today;
        self
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom))
    }
}

async fn get_weather_forecast(State(state): State<ApiState>) -> Json<Vec<WeatherForecast>> {
    let forecasts = generate_forecasts((state.today)(), state.rng.as_ref());
    tracing::debug!(count = forecasts.len(), "Generated weather forecasts");
    Json(forecasts)
}

async fn openapi_document() -> Json<Value> {
    Json(openapi_spec())
}

/// OpenAPI 3.1 description of the service.
pub fn openapi_spec() -> Value {
    json!({
        "openapi": "3.1.1",
        "info": {
            "title": format!("{SERVICE_NAME} | v1"),
            "version": "1.0.0"
        },
        "paths": {
            FORECAST_PATH: {
                "get": {
                    "operationId": "GetWeatherForecast",
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/WeatherForecast" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "WeatherForecast": {
                    "type": "object",
                    "required": ["date", "temperatureC"],
                    "properties": {
                        "date": { "type": "string", "format": "date" },
                        "temperatureC": { "type": "integer", "format": "int32" },
                        "summary": {
                            "type": ["null", "string"],
                            "enum": SUMMARIES
                        },
                        "temperatureF": { "type": "integer", "format": "int32" }
                    }
                }
            }
        }
    })
}

/// Routes of the service, without defaults.
pub fn routes(state: ApiState, ctx: &StartupContext) -> Router {
    let router = Router::new()
        .route(FORECAST_PATH, get(get_weather_forecast))
        .with_state(state);

    if ctx.environment().is_development() {
        router.route(OPENAPI_PATH, get(openapi_document))
    } else {
        router
    }
}

/// Apply the service defaults and build the full router.
pub fn build(config: ServiceConfig, state: ApiState) -> Router {
    let mut ctx = StartupContext::new(config);
    ctx.apply_service_defaults();
    ctx.finish_router(routes(state, &ctx))
}

/// Serve the API on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    config: ServiceConfig,
    state: ApiState,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let name = config.service_name.clone();
    HttpServer::new(name, build(config, state))
        .run(listener, shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::forecast::SequenceRandom;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn state() -> ApiState {
        let today = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        ApiState::new(Arc::new(SequenceRandom::new(vec![-20, 0, 54, 9])))
            .with_clock(Arc::new(move || today))
    }

    fn config(environment: Environment) -> ServiceConfig {
        let mut config = ServiceConfig::named(SERVICE_NAME);
        config.environment = environment;
        config
    }

    async fn get(router: Router, path: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_forecast_shape() {
        let router = routes(state(), &StartupContext::new(config(Environment::Production)));
        let (status, body) = get(router, FORECAST_PATH).await;
        assert_eq!(status, StatusCode::OK);

        let json: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 5);
        assert_eq!(json[0]["date"], "2024-02-29");
        assert_eq!(json[4]["date"], "2024-03-04");
        assert_eq!(json[0]["temperatureC"], -20);
        assert_eq!(json[0]["temperatureF"], -3);
        assert_eq!(json[0]["summary"], "Freezing");
        assert_eq!(json[1]["temperatureC"], 54);
        assert_eq!(json[1]["summary"], "Scorching");
    }

    #[tokio::test]
    async fn test_openapi_only_in_development() {
        let dev = routes(state(), &StartupContext::new(config(Environment::Development)));
        let (status, body) = get(dev, OPENAPI_PATH).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            doc["paths"][FORECAST_PATH]["get"]["operationId"],
            "GetWeatherForecast"
        );

        let prod = routes(state(), &StartupContext::new(config(Environment::Production)));
        assert_eq!(get(prod, OPENAPI_PATH).await.0, StatusCode::NOT_FOUND);
    }
}
