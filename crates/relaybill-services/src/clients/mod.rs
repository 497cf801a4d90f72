//! HTTP clients for the usage and exchange-rate platforms
//!
//! Each client implements the matching source trait from relaybill-core so
//! the aggregator and the converter can be tested without a network.

pub mod exchange;
pub mod retell;
pub mod twilio;

pub use exchange::HttpExchangeRateSource;
pub use retell::RetellClient;
pub use twilio::TwilioClient;

use relaybill_core::AppError;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the platform clients
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout: request took longer than {0}s")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Listing incomplete: more than {0} pages")]
    Truncated(usize),
}

impl UpstreamError {
    /// Convert into the application error for `service`
    pub fn into_app_error(self, service: &str) -> AppError {
        match self {
            UpstreamError::Config(message) => AppError::Config(format!("{}: {}", service, message)),
            other => AppError::Upstream {
                service: service.to_string(),
                message: other.to_string(),
            },
        }
    }

    fn from_send(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(timeout_secs)
        } else {
            UpstreamError::Connection(e.to_string())
        }
    }
}

/// Shared client settings for all platforms
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<Client, UpstreamError> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("relaybill/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UpstreamError::Connection(e.to_string()))
}

/// Send a request and decode a JSON body, mapping transport and status failures
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout_secs: u64,
) -> Result<T, UpstreamError> {
    let response = request
        .send()
        .await
        .map_err(|e| UpstreamError::from_send(e, timeout_secs))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::HttpError(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| UpstreamError::ParseError(format!("Failed to read response body: {}", e)))?;

    serde_json::from_str(&body)
        .map_err(|e| UpstreamError::ParseError(format!("Failed to parse JSON: {}", e)))
}
