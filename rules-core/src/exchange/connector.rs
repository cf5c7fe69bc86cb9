// ====
// Binance Spot REST Connector
// ====
// Public market-metadata endpoints only. Signed endpoints are not used.
// ====

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::errors::ExchangeError;
use super::traits::ExchangeInfoSource;
use crate::config::ExchangeSettings;

/// Binance API Endpoints
pub const MAINNET_API: &str = "https://api.binance.com";
pub const TESTNET_API: &str = "https://testnet.binance.vision";

const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";

/// Binance Connector
///
/// Thin `reqwest` client for the unsigned exchange-info endpoint
pub struct BinanceConnector {
    /// HTTP client
    client: Client,
    /// API base URL
    base_url: Url,
    /// Venue name for stored records
    name: String,
}

impl BinanceConnector {
    /// Create new connector
    pub fn new(base_url: &str, name: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            name: name.to_string(),
        })
    }

    pub fn from_settings(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        Self::new(
            &settings.base_url,
            &settings.name,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn exchange_info_url(&self) -> Result<Url, ExchangeError> {
        Ok(self.base_url.join(EXCHANGE_INFO_PATH)?)
    }
}

#[async_trait]
impl ExchangeInfoSource for BinanceConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange_info(&self) -> Result<Value, ExchangeError> {
        let url = self.exchange_info_url()?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        // 429 = request weight exceeded, 418 = IP banned after repeated 429s
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            warn!("exchangeInfo rate limited: {}", status);
            return Err(ExchangeError::RateLimited(status.as_u16()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::HttpError(status.as_u16(), body));
        }

        let value: Value = serde_json::from_str(&body)?;
        info!("exchangeInfo successfully fetched from {}", self.name);
        Ok(value)
    }
}
