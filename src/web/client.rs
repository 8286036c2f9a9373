//! Typed client of the forecast API.

use std::pin::pin;

use axum::http::{header, StatusCode};
use futures_util::StreamExt;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::apiservice::FORECAST_PATH;
use crate::forecast::WeatherForecast;
use crate::web::stream::{json_array_stream, StreamError};

/// Logical address of the API service; https preferred over http.
pub const API_BASE_ADDRESS: &str = "https+http://apiservice";

/// Items requested when the caller does not say otherwise.
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// Failures of [`WeatherApiClient::get_forecasts`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("API answered {0}")]
    Status(StatusCode),

    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid API address: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<StreamError<reqwest::Error>> for ClientError {
    fn from(e: StreamError<reqwest::Error>) -> Self {
        match e {
            StreamError::Body(e) => ClientError::Body(e),
            StreamError::Malformed(message) => ClientError::Malformed(message),
        }
    }
}

/// Client of `GET /weatherforecast`.
#[derive(Clone)]
pub struct WeatherApiClient {
    http: ClientWithMiddleware,
    base: Url,
}

impl WeatherApiClient {
    pub fn new(http: ClientWithMiddleware, base: Url) -> Self {
        Self { http, base }
    }

    /// Client addressing the API by its logical name.
    pub fn with_logical_address(http: ClientWithMiddleware) -> Result<Self, ClientError> {
        Ok(Self::new(http, Url::parse(API_BASE_ADDRESS)?))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Up to `max_items` forecasts, read as the response streams in.
    ///
    /// Stops reading once `max_items` forecasts were collected. `null` and
    /// unparseable elements are skipped. Cancellation discards whatever was
    /// collected and returns [`ClientError::Cancelled`].
    pub async fn get_forecasts(
        &self,
        max_items: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<WeatherForecast>, ClientError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }

        let url = self.base.join(FORECAST_PATH)?;
        let request = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Forecast request failed");
            return Err(ClientError::Status(status));
        }

        let mut forecasts = pin!(json_array_stream::<WeatherForecast, _, _, _>(
            response.bytes_stream()
        ));
        let mut collected = Vec::new();

        while collected.len() < max_items {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                next = forecasts.next() => next,
            };
            match next {
                Some(Ok(forecast)) => collected.push(forecast),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        tracing::debug!(count = collected.len(), max_items, "Forecasts received");
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_address_join() {
        let client = WeatherApiClient::with_logical_address(
            reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build(),
        )
        .unwrap();
        let url = client.base().join(FORECAST_PATH).unwrap();
        assert_eq!(url.as_str(), "https+http://apiservice/weatherforecast");
    }

    #[tokio::test]
    async fn test_zero_items_sends_nothing() {
        let client = WeatherApiClient::new(
            reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build(),
            Url::parse("http://127.0.0.1:9").unwrap(),
        );
        let forecasts = client.get_forecasts(0, &CancellationToken::new()).await.unwrap();
        assert!(forecasts.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = WeatherApiClient::new(
            reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build(),
            Url::parse("http://127.0.0.1:9").unwrap(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.get_forecasts(3, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
