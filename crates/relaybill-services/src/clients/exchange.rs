//! Exchange-rate HTTP source
//!
//! Reads the CAD entry from a USD-based rates document
//! (`{"base": "USD", "rates": {"CAD": 1.36, ...}}`).

use async_trait::async_trait;
use relaybill_core::{config::ExchangeConfig, traits::ExchangeRateSource, AppResult};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use super::{build_http_client, send_json, UpstreamError};

const SERVICE: &str = "exchange-rate";

#[derive(Debug, Deserialize)]
struct RatesDocument {
    rates: HashMap<String, Decimal>,
}

/// Exchange-rate source backed by a public rates endpoint
pub struct HttpExchangeRateSource {
    http_client: Client,
    url: String,
    timeout_secs: u64,
}

impl HttpExchangeRateSource {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            url: url.to_string(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, UpstreamError> {
        Self::new(&config.url, config.timeout_secs)
    }

    /// Fetch the current USD to CAD rate
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_rate(&self) -> Result<Decimal, UpstreamError> {
        let document: RatesDocument =
            send_json(self.http_client.get(&self.url), self.timeout_secs).await?;

        let rate = document
            .rates
            .get("CAD")
            .copied()
            .ok_or_else(|| UpstreamError::ParseError("CAD rate missing".to_string()))?;

        debug!(%rate, "Fetched USD to CAD rate");
        Ok(rate)
    }
}

#[async_trait]
impl ExchangeRateSource for HttpExchangeRateSource {
    async fn fetch_usd_to_cad(&self) -> AppResult<Decimal> {
        self.fetch_rate().await.map_err(|e| {
            warn!(error = %e, "Exchange rate fetch failed");
            e.into_app_error(SERVICE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use relaybill_core::AppError;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fetch_rate() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v4/latest/USD");
                then.status(200).json_body(serde_json::json!({
                    "base": "USD",
                    "date": "2024-03-15",
                    "rates": { "USD": 1, "CAD": 1.354, "EUR": 0.918 }
                }));
            })
            .await;

        let source = HttpExchangeRateSource::new(&server.url("/v4/latest/USD"), 5).unwrap();
        let rate = source.fetch_usd_to_cad().await.unwrap();

        mock.assert_async().await;
        assert_eq!(rate, dec!(1.354));
    }

    #[tokio::test]
    async fn test_missing_cad_rate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rates");
                then.status(200)
                    .json_body(serde_json::json!({ "rates": { "EUR": 0.918 } }));
            })
            .await;

        let source = HttpExchangeRateSource::new(&server.url("/rates"), 5).unwrap();
        assert!(matches!(
            source.fetch_rate().await,
            Err(UpstreamError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rates");
                then.status(500);
            })
            .await;

        let source = HttpExchangeRateSource::new(&server.url("/rates"), 5).unwrap();
        let err = source.fetch_usd_to_cad().await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }
}
