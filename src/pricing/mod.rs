//! USD price providers.
//!
//! Defines the `PriceSource` trait and the CoinGecko implementation.

pub mod coingecko;

use async_trait::async_trait;

use crate::types::{FetchError, SpotPrices};

/// Abstraction over spot price feeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current ETH and XYO prices in USD, fetched together.
    async fn spot_prices(&self) -> Result<SpotPrices, FetchError>;

    fn name(&self) -> &'static str;
}
