//! Shared types for the XYO wallet monitor.
//!
//! These types form the data model used across all modules: snapshots
//! recorded by the session loop, spot prices, the session result handed
//! to the summary/report stage, and the domain error enums.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// USD spot prices for the two tracked assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotPrices {
    pub eth_usd: Decimal,
    pub xyo_usd: Decimal,
}

impl fmt::Display for SpotPrices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ETH {} | XYO ${:.8}",
            format_usd(self.eth_usd),
            self.xyo_usd
        )
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One recorded observation of the wallet's balances.
///
/// Created once per successful iteration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub timestamp: DateTime<Utc>,
    pub wallet: String,
    /// Native balance in whole ETH.
    pub eth_balance: Decimal,
    /// Token balance in whole XYO.
    pub xyo_balance: Decimal,
    pub eth_price_usd: Option<Decimal>,
    pub xyo_price_usd: Option<Decimal>,
}

impl WalletSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        wallet: &str,
        eth_balance: Decimal,
        xyo_balance: Decimal,
        prices: Option<SpotPrices>,
    ) -> Self {
        Self {
            timestamp,
            wallet: wallet.to_string(),
            eth_balance,
            xyo_balance,
            eth_price_usd: prices.map(|p| p.eth_usd),
            xyo_price_usd: prices.map(|p| p.xyo_usd),
        }
    }

    pub fn eth_value_usd(&self) -> Option<Decimal> {
        self.eth_price_usd.map(|p| self.eth_balance * p)
    }

    pub fn xyo_value_usd(&self) -> Option<Decimal> {
        self.xyo_price_usd.map(|p| self.xyo_balance * p)
    }

    /// Total portfolio value; only defined when both prices are known.
    pub fn total_value_usd(&self) -> Option<Decimal> {
        Some(self.eth_value_usd()? + self.xyo_value_usd()?)
    }
}

impl fmt::Display for WalletSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ETH {:.6} | XYO {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.eth_balance,
            format_token_count(self.xyo_balance),
        )?;
        if let Some(total) = self.total_value_usd() {
            write!(f, " | total {}", format_usd(total))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session result
// ---------------------------------------------------------------------------

/// How the session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// The configured bound was reached (or the loop was open-ended and
    /// hit its iteration cap).
    Completed,
    /// The shutdown signal fired before the bound was reached.
    Interrupted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Everything the session loop accumulated, consumed once at loop end.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Chronological; insertion order is observation order.
    pub snapshots: Vec<WalletSnapshot>,
    pub iterations: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl SessionResult {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Iterations whose balance fetches failed and were not recorded.
    pub fn skipped(&self) -> u64 {
        self.iterations.saturating_sub(self.snapshots.len() as u64)
    }

    pub fn latest(&self) -> Option<&WalletSnapshot> {
        self.snapshots.last()
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Round half away from zero to two decimal places.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a USD amount as `$12,345.67` (rounded to cents, thousands
/// separators, leading `-` for negatives).
pub fn format_usd(amount: Decimal) -> String {
    let rounded = round_cents(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let sign = if negative { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(whole))
}

/// Format a whole-token count as `1,234,567` (banker's rounding to units).
pub fn format_token_count(amount: Decimal) -> String {
    let rounded = amount.round_dp(0);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.0}", rounded.abs());

    let sign = if negative { "-" } else { "" };
    format!("{sign}{}", group_thousands(&text))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Shorten a wallet address for log lines: `0x12345678...9abcdef0`.
pub fn short_address(address: &str) -> String {
    if address.len() <= 18 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..10], &address[address.len() - 8..])
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single call to the balance or price API did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error ({service}): {message}")]
    Network { service: String, message: String },

    #[error("request timed out ({service})")]
    Timeout { service: String },

    #[error("HTTP status {status} ({service})")]
    HttpStatus { service: String, status: u16 },

    #[error("malformed response ({service}): {message}")]
    MalformedBody { service: String, message: String },

    #[error("API reported failure ({service}): {message}")]
    Api { service: String, message: String },

    #[error("unparseable amount {raw:?}: {reason}")]
    Amount { raw: String, reason: String },

    #[error("missing field in response ({service}): {field}")]
    MissingField { service: String, field: String },
}

impl FetchError {
    /// Placeholder shown in place of a balance that could not be fetched.
    pub fn sentinel(&self) -> Decimal {
        Decimal::ZERO
    }

    /// Short machine-friendly reason for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "network",
            FetchError::Timeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::MalformedBody { .. } => "malformed_json",
            FetchError::Api { .. } => "api_status",
            FetchError::Amount { .. } => "amount",
            FetchError::MissingField { .. } => "missing_field",
        }
    }

    /// Classify a reqwest transport error.
    pub fn from_reqwest(service: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { service: service.to_string() }
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus { service: service.to_string(), status: status.as_u16() }
        } else if err.is_decode() {
            FetchError::MalformedBody { service: service.to_string(), message: err.to_string() }
        } else {
            FetchError::Network { service: service.to_string(), message: err.to_string() }
        }
    }
}

/// Failures of the session as a whole.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not fetch USD prices, aborting session: {0}")]
    PricingUnavailable(FetchError),

    #[error("session already ran")]
    AlreadyStarted,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
