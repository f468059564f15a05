//! Configuration resolution.
//!
//! Session settings (API key, wallet, target, schedule) come from
//! environment variables, resolved through an injectable lookup so tests
//! never mutate the process environment. Endpoint settings (base URLs,
//! timeout, report directory) come from an optional TOML file and are
//! injected into the HTTP clients at construction.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cli::CliArgs;

// ---------------------------------------------------------------------------
// Keys and defaults
// ---------------------------------------------------------------------------

pub const API_KEY_VAR: &str = "ETHERSCAN_API_KEY";
pub const WALLET_VAR: &str = "XYO_WALLET_ADDRESS";
pub const TARGET_VAR: &str = "LIQUIDATION_TARGET_USD";
pub const CONTRACT_VAR: &str = "XYO_CONTRACT_ADDRESS";
pub const INTERVAL_VAR: &str = "POLL_INTERVAL_SECS";
pub const RUNTIME_VAR: &str = "RUNTIME_MINUTES";
pub const MAX_ITERATIONS_VAR: &str = "MAX_ITERATIONS";

/// Short names accepted as fallbacks for the two required keys.
const API_KEY_ALIAS: &str = "API_KEY";
const WALLET_ALIAS: &str = "WALLET_ADDRESS";

/// The published XYO Network ERC-20 contract on Ethereum mainnet.
pub const XYO_CONTRACT: &str = "0x55296f69f40Ea6d20E478533C15a6B08b654E758";

pub const DEFAULT_TARGET_USD: Decimal = dec!(15000.00);

/// Longest accepted session: one leap year.
pub const MAX_RUNTIME_MINUTES: u64 = 366 * 24 * 60;

/// Cadence for sessions bounded by a duration or an iteration cap.
pub const DEFAULT_BOUNDED_INTERVAL_SECS: u64 = 10;

/// Cadence for open-ended loop mode.
pub const DEFAULT_LOOP_INTERVAL_SECS: u64 = 900;

pub const ETHERSCAN_BASE: &str = "https://api.etherscan.io/api";
pub const COINGECKO_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum,xyo-network&vs_currencies=usd";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("endpoint config {path}: {message}")]
    EndpointFile { path: String, message: String },
}

impl ConfigError {
    /// Operator-facing message explaining what is wrong and how to fix it.
    pub fn remediation(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = Vec::new();
        out.push(rule.clone());
        match self {
            ConfigError::Missing(keys) => {
                out.push("ERROR: Missing Required Environment Variables".to_string());
                out.push(rule.clone());
                out.push(String::new());
                out.push("The following environment variables are not set:".to_string());
                for key in keys {
                    out.push(format!("  - {key}"));
                }
                out.push(String::new());
                out.push("Setup Instructions:".to_string());
                out.push("  1. For GitHub Actions:".to_string());
                out.push("     - Go to Settings -> Secrets and variables -> Actions".to_string());
                out.push(format!("     - Add secrets: {}", keys.join(" and ")));
                out.push(String::new());
                out.push("  2. For local testing:".to_string());
                for key in keys {
                    out.push(format!("     export {key}='{}'", placeholder(key)));
                }
                out.push(String::new());
                out.push("A .env file in the working directory is also read.".to_string());
            }
            ConfigError::Invalid { key, value, reason } => {
                out.push("ERROR: Invalid Configuration Value".to_string());
                out.push(rule.clone());
                out.push(String::new());
                out.push(format!("  {key}={value:?} is not usable: {reason}"));
                out.push(String::new());
                out.push(format!("  Fix the value in your shell (export {key}=...),"));
                out.push("  your .env file, or the CI secret store, or unset it to use the default.".to_string());
            }
            ConfigError::EndpointFile { path, message } => {
                out.push("ERROR: Could Not Load Endpoint Config".to_string());
                out.push(rule.clone());
                out.push(String::new());
                out.push(format!("  {path}: {message}"));
                out.push("  Pass a valid TOML file with --config, or omit the flag for defaults.".to_string());
            }
        }
        out.push(rule);
        out.join("\n")
    }
}

fn placeholder(key: &str) -> &'static str {
    match key {
        API_KEY_VAR => "your_api_key",
        WALLET_VAR => "0x...",
        _ => "...",
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// When the session loop stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Stop once this much wall-clock time has elapsed.
    pub run_for: Option<Duration>,
    /// Stop after this many iterations.
    pub max_iterations: Option<u64>,
}

impl Schedule {
    /// Neither a duration nor an iteration cap: runs until interrupted.
    pub fn is_open_ended(&self) -> bool {
        self.run_for.is_none() && self.max_iterations.is_none()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {}s", self.interval.as_secs())?;
        if let Some(run_for) = self.run_for {
            write!(f, " for {:.1} min", run_for.as_secs_f64() / 60.0)?;
        }
        if let Some(n) = self.max_iterations {
            write!(f, " (max {n} iterations)")?;
        }
        if self.is_open_ended() {
            write!(f, " until interrupted")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session config
// ---------------------------------------------------------------------------

/// Validated settings for one monitoring session. Built once at startup.
pub struct SessionConfig {
    pub wallet_address: String,
    pub api_key: SecretString,
    pub token_contract: String,
    pub liquidation_target_usd: Decimal,
    pub schedule: Schedule,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("wallet_address", &self.wallet_address)
            .field("api_key", &"[REDACTED]")
            .field("token_contract", &self.token_contract)
            .field("liquidation_target_usd", &self.liquidation_target_usd)
            .field("schedule", &self.schedule)
            .finish()
    }
}

impl SessionConfig {
    /// Resolve from the process environment.
    pub fn from_env(cli: &CliArgs) -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok(), cli)
    }

    /// Resolve from an arbitrary key/value lookup. CLI values take
    /// precedence over the lookup for schedule settings.
    pub fn resolve<F>(lookup: F, cli: &CliArgs) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).or_else(|| get(API_KEY_ALIAS));
        let wallet = get(WALLET_VAR).or_else(|| get(WALLET_ALIAS));

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(API_KEY_VAR);
        }
        if wallet.is_none() {
            missing.push(WALLET_VAR);
        }
        let (Some(api_key), Some(wallet_address)) = (api_key, wallet) else {
            return Err(ConfigError::Missing(missing));
        };

        let liquidation_target_usd = match get(TARGET_VAR) {
            Some(raw) => parse_target(&raw)?,
            None => DEFAULT_TARGET_USD,
        };

        let token_contract = get(CONTRACT_VAR).unwrap_or_else(|| XYO_CONTRACT.to_string());

        let run_minutes = match cli.duration_minutes {
            Some(m) => Some(bounded_runtime("--duration-minutes", &m.to_string())?),
            None => get(RUNTIME_VAR)
                .map(|raw| bounded_runtime(RUNTIME_VAR, &raw))
                .transpose()?,
        };
        let max_iterations = match cli.max_iterations {
            Some(n) => Some(n),
            None => get(MAX_ITERATIONS_VAR)
                .map(|raw| parse_positive::<u64>(MAX_ITERATIONS_VAR, &raw))
                .transpose()?,
        };
        let max_iterations = if cli.once { Some(1) } else { max_iterations };

        let bounded = run_minutes.is_some() || max_iterations.is_some();
        let interval_secs = match cli.interval_secs {
            Some(s) => s,
            None => match get(INTERVAL_VAR) {
                Some(raw) => parse_positive::<u64>(INTERVAL_VAR, &raw)?,
                None if bounded => DEFAULT_BOUNDED_INTERVAL_SECS,
                None => DEFAULT_LOOP_INTERVAL_SECS,
            },
        };

        Ok(Self {
            wallet_address,
            api_key: SecretString::new(api_key),
            token_contract,
            liquidation_target_usd,
            schedule: Schedule {
                interval: Duration::from_secs(interval_secs),
                run_for: run_minutes.map(|m| Duration::from_secs(m * 60)),
                max_iterations,
            },
        })
    }

    /// Borrow the API key for building request URLs.
    pub fn expose_api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

fn parse_target(raw: &str) -> Result<Decimal, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: TARGET_VAR,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    let target = Decimal::from_str(&cleaned).map_err(|_| invalid("expected a decimal USD amount"))?;
    if target.is_sign_negative() {
        return Err(invalid("must not be negative"));
    }
    Ok(target)
}

/// Positive minute count no larger than `MAX_RUNTIME_MINUTES`.
fn bounded_runtime(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let minutes = parse_positive::<u64>(key, raw)?;
    if minutes > MAX_RUNTIME_MINUTES {
        return Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: format!("at most {MAX_RUNTIME_MINUTES} minutes (one year)"),
        });
    }
    Ok(minutes)
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Endpoint config
// ---------------------------------------------------------------------------

/// External service endpoints and I/O locations.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub explorer_base_url: String,
    pub price_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub report_dir: PathBuf,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            explorer_base_url: ETHERSCAN_BASE.to_string(),
            price_url: COINGECKO_PRICE_URL.to_string(),
            request_timeout_secs: 15,
            user_agent: concat!("xyo-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl EndpointConfig {
    /// Load endpoint settings from a TOML file. Absent keys keep defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::EndpointFile {
            path: path.to_string(),
            message: format!("failed to read: {e}"),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::EndpointFile {
            path: path.to_string(),
            message: format!("failed to parse: {e}"),
        })
    }

    /// Defaults, or the file named by `--config`.
    pub fn from_cli(cli: &CliArgs) -> Result<Self, ConfigError> {
        match &cli.config_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
