//! Minor-unit scaling.
//!
//! Explorer APIs return balances as base-10 integer strings in the
//! token's smallest unit. Those are parsed into a 256-bit unsigned
//! integer (the on-chain width) and scaled into a `Decimal` without
//! passing through floating point.

use ruint::aliases::U256;
use rust_decimal::Decimal;

/// Decimals used by both ETH (wei) and the XYO ERC-20 token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Largest scale a `Decimal` can carry.
const MAX_DECIMALS: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    #[error("not a base-10 unsigned integer: {0:?}")]
    NotAnInteger(String),

    #[error("amount {0} exceeds the representable range")]
    OutOfRange(String),

    #[error("unsupported token decimals: {0}")]
    UnsupportedDecimals(u32),
}

/// Parse a decimal-string integer amount such as `"1500000000000000000"`.
pub fn parse_minor_units(raw: &str) -> Result<U256, ScaleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScaleError::NotAnInteger(raw.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| ScaleError::OutOfRange(trimmed.to_string()))
}

/// Divide a raw minor-unit amount by `10^decimals`.
///
/// The whole part must fit in a `Decimal`; the fractional part is kept at
/// full precision unless the whole part is large enough that the 96-bit
/// mantissa cannot hold every digit, in which case the sum is rounded.
pub fn scale_minor_units(raw: U256, decimals: u32) -> Result<Decimal, ScaleError> {
    if decimals > MAX_DECIMALS {
        return Err(ScaleError::UnsupportedDecimals(decimals));
    }
    let unit = U256::from(10u128.pow(decimals));
    let whole = raw / unit;
    let frac = raw % unit;

    let out_of_range = || ScaleError::OutOfRange(raw.to_string());

    let whole = u128::try_from(whole).map_err(|_| out_of_range())?;
    let whole = i128::try_from(whole).map_err(|_| out_of_range())?;
    let whole = Decimal::try_from_i128_with_scale(whole, 0).map_err(|_| out_of_range())?;

    // frac < 10^28 always fits the mantissa
    let frac = u128::try_from(frac).map_err(|_| out_of_range())?;
    let frac = Decimal::try_from_i128_with_scale(frac as i128, decimals)
        .map_err(|_| out_of_range())?;

    whole.checked_add(frac).ok_or_else(out_of_range)
}

/// Parse and scale an 18-decimal amount in one step.
pub fn decimal_from_wei_str(raw: &str) -> Result<Decimal, ScaleError> {
    scale_minor_units(parse_minor_units(raw)?, TOKEN_DECIMALS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
