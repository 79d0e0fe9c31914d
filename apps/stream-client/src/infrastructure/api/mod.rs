//! Backend HTTP Adapter
//!
//! `reqwest` implementation of the [`MarketDataApi`] port against the
//! portfolio backend's REST surface.
//!
//! # Endpoints
//!
//! - `GET /v1/prices/snapshot?symbols=AAPL,MSFT` → [`PriceSnapshot`]
//! - `GET /v1/service/status` → [`ServiceStatus`]
//! - `POST /v1/prices/refresh` with `{"symbols": [...], "force": bool}` → ack

use async_trait::async_trait;
use serde::Serialize;

use crate::application::ports::{ApiError, MarketDataApi, PriceSnapshot, ServiceStatus};
use crate::infrastructure::config::{ApiSettings, Credentials};

/// Request timeout for all pull-path calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Cap on error-body text carried into [`ApiError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Refresh request body.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    symbols: &'a [String],
    force: bool,
}

/// HTTP implementation of the market data port.
pub struct HttpMarketDataApi {
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl HttpMarketDataApi {
    /// Create an adapter for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(settings: &ApiSettings, credentials: Credentials) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio-stream-client/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Reject non-success answers, carrying a bounded slice of the body.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut message = response.text().await.unwrap_or_default();
        message.truncate(ERROR_BODY_LIMIT);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MarketDataApi for HttpMarketDataApi {
    async fn fetch_snapshot(&self, symbols: &[String]) -> Result<PriceSnapshot, ApiError> {
        let url = self.endpoint("/v1/prices/snapshot");
        tracing::debug!(url = %url, symbols = symbols.len(), "Fetching price snapshot");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.credentials.token())
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Self::check_status(response)
            .await?
            .json::<PriceSnapshot>()
            .await
            .map_err(|err| ApiError::Payload(err.to_string()))
    }

    async fn fetch_service_status(&self) -> Result<ServiceStatus, ApiError> {
        let url = self.endpoint("/v1/service/status");
        tracing::debug!(url = %url, "Fetching service status");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.credentials.token())
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Self::check_status(response)
            .await?
            .json::<ServiceStatus>()
            .await
            .map_err(|err| ApiError::Payload(err.to_string()))
    }

    async fn request_refresh(&self, symbols: &[String], force: bool) -> Result<(), ApiError> {
        let url = self.endpoint("/v1/prices/refresh");
        tracing::debug!(url = %url, force, "Requesting backend refresh");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.credentials.token())
            .json(&RefreshRequest { symbols, force })
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Self::check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base: &str) -> HttpMarketDataApi {
        HttpMarketDataApi::new(
            &ApiSettings {
                base_url: base.to_string(),
            },
            Credentials::new("token").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let api = adapter("https://api.folio.test/");
        assert_eq!(
            api.endpoint("/v1/service/status"),
            "https://api.folio.test/v1/service/status"
        );
    }

    #[test]
    fn endpoint_joins_paths() {
        let api = adapter("https://api.folio.test");
        assert_eq!(
            api.endpoint("/v1/prices/snapshot"),
            "https://api.folio.test/v1/prices/snapshot"
        );
    }
}
