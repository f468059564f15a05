//! CoinGecko simple-price client.
//!
//! API: `https://api.coingecko.com/api/v3/simple/price`
//! Auth: None required (public tier).
//! Rate limit: ~10-30 req/min on the public tier; the monitor calls it
//! once per session.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::PriceSource;
use crate::config::EndpointConfig;
use crate::types::{FetchError, SpotPrices};

const SERVICE: &str = "coingecko";

pub const ETH_ID: &str = "ethereum";
pub const XYO_ID: &str = "xyo-network";

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<Decimal>,
}

type SimplePriceResponse = HashMap<String, UsdQuote>;

pub struct CoinGeckoClient {
    http: Client,
    url: String,
}

impl CoinGeckoClient {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(endpoints.request_timeout())
            .user_agent(endpoints.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client for CoinGecko")?;
        Ok(Self { http, url: endpoints.price_url.clone() })
    }

    fn extract(data: &SimplePriceResponse) -> Result<SpotPrices, FetchError> {
        let price = |id: &str| {
            data.get(id).and_then(|q| q.usd).ok_or_else(|| FetchError::MissingField {
                service: SERVICE.to_string(),
                field: format!("{id}.usd"),
            })
        };
        Ok(SpotPrices { eth_usd: price(ETH_ID)?, xyo_usd: price(XYO_ID)? })
    }

    async fn fetch(&self) -> Result<SpotPrices, FetchError> {
        debug!(url = %self.url, "Fetching CoinGecko prices");

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !resp.status().is_success() {
            return Err(FetchError::HttpStatus {
                service: SERVICE.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;
        let data: SimplePriceResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::MalformedBody {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        Self::extract(&data)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn spot_prices(&self) -> Result<SpotPrices, FetchError> {
        let result = self.fetch().await;
        if let Err(e) = &result {
            warn!(reason = e.kind(), error = %e, "CoinGecko price error");
        }
        result
    }

    fn name(&self) -> &'static str {
        SERVICE
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
