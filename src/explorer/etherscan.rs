//! Etherscan account API client.
//!
//! API docs: https://docs.etherscan.io/api-endpoints/accounts
//! Base URL: https://api.etherscan.io/api
//! Auth: `apikey` query param.
//!
//! Both balance endpoints answer `{status, message, result}` where
//! `result` is a base-10 integer string in minor units on success and an
//! error description when `status == "0"`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::BalanceSource;
use crate::config::EndpointConfig;
use crate::types::FetchError;
use crate::units::decimal_from_wei_str;

const SERVICE: &str = "etherscan";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    /// A string on every documented path, but kept loose so an odd
    /// payload is reported as a field error rather than a JSON error.
    #[serde(default)]
    result: serde_json::Value,
}

impl EtherscanResponse {
    /// Extract the raw amount string, or the API's own failure reason.
    fn into_amount(self) -> Result<String, FetchError> {
        if self.status == "0" && self.message != "OK" {
            let reason = match self.result {
                serde_json::Value::String(s) if !s.is_empty() => s,
                _ if !self.message.is_empty() => self.message,
                _ => "Unknown Etherscan error".to_string(),
            };
            return Err(FetchError::Api { service: SERVICE.to_string(), message: reason });
        }
        match self.result {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Null => Err(FetchError::MissingField {
                service: SERVICE.to_string(),
                field: "result".to_string(),
            }),
            other => Err(FetchError::Amount {
                raw: other.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Which balance endpoint to call.
#[derive(Debug, Clone, Copy)]
enum BalanceQuery<'a> {
    Native,
    Token { contract: &'a str },
}

pub struct EtherscanClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl EtherscanClient {
    pub fn new(api_key: SecretString, endpoints: &EndpointConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(endpoints.request_timeout())
            .user_agent(endpoints.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client for Etherscan")?;
        Ok(Self {
            http,
            base_url: endpoints.explorer_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, wallet: &str, query: BalanceQuery<'_>) -> String {
        let base = &self.base_url;
        let address = urlencoding::encode(wallet);
        let apikey = urlencoding::encode(self.api_key.expose_secret());
        match query {
            BalanceQuery::Native => format!(
                "{base}?module=account&action=balance&address={address}&tag=latest&apikey={apikey}"
            ),
            BalanceQuery::Token { contract } => format!(
                "{base}?module=account&action=tokenbalance&contractaddress={}\
                 &address={address}&tag=latest&apikey={apikey}",
                urlencoding::encode(contract),
            ),
        }
    }

    /// One GET round-trip, mapped to a whole-unit balance.
    async fn fetch(&self, wallet: &str, query: BalanceQuery<'_>) -> Result<Decimal, FetchError> {
        let url = self.url(wallet, query);
        debug!(base = %self.base_url, ?query, "Querying Etherscan");

        let resp = self
            .http
            .get(&url)
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
        let data: EtherscanResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::MalformedBody {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        let raw = data.into_amount()?;
        decimal_from_wei_str(&raw).map_err(|e| FetchError::Amount {
            reason: e.to_string(),
            raw,
        })
    }

    fn log_failure(&self, what: &str, result: &Result<Decimal, FetchError>) {
        if let Err(e) = result {
            warn!(balance = what, reason = e.kind(), error = %e, "Etherscan API error");
        }
    }
}

#[async_trait]
impl BalanceSource for EtherscanClient {
    async fn native_balance(&self, wallet: &str) -> Result<Decimal, FetchError> {
        let result = self.fetch(wallet, BalanceQuery::Native).await;
        self.log_failure("eth", &result);
        result
    }

    async fn token_balance(&self, wallet: &str, contract: &str) -> Result<Decimal, FetchError> {
        let result = self.fetch(wallet, BalanceQuery::Token { contract }).await;
        self.log_failure("xyo", &result);
        result
    }

    fn name(&self) -> &'static str {
        SERVICE
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
