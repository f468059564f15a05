//! Blockchain explorer integrations.
//!
//! Defines the `BalanceSource` trait used by the session loop and the
//! Etherscan implementation used in production.

pub mod etherscan;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::FetchError;

/// Reads current wallet balances in whole-coin units.
///
/// Implementors log their own failures and report them as `Err`; a
/// failed call never panics and never aborts the caller's loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Native coin (ETH) balance.
    async fn native_balance(&self, wallet: &str) -> Result<Decimal, FetchError>;

    /// ERC-20 balance for `contract`.
    async fn token_balance(&self, wallet: &str, contract: &str) -> Result<Decimal, FetchError>;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}
