//! Money Conversion Module
//!
//! Conversion between the internal minor-unit `u64` representation and the
//! decimal strings the user types and the gateway expects.
//!
//! ## Internal Representation
//! - All amounts are `u64` minor units of the session currency
//! - The scale factor is `10^decimals` from [`CurrencyContext`](crate::session::CurrencyContext)
//! - KES on M-Pesa uses `decimals = 0`

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::core_types::Amount;

/// Largest scale whose `10^decimals` fits a `u64`
pub const MAX_DECIMALS: u32 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Parse a user-entered amount into minor units.
///
/// Rejects excess precision instead of truncating it.
///
/// ```
/// use pesa_wallet::money::parse_amount;
/// assert_eq!(parse_amount("1,500", 0).unwrap(), 1_500);
/// assert_eq!(parse_amount("12.50", 2).unwrap(), 1_250);
/// ```
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<Amount, MoneyError> {
    let cleaned: String = amount_str
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if cleaned.starts_with('-') {
        return Err(MoneyError::InvalidAmount);
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            amount_str.trim()
        )));
    }

    let decimal = Decimal::from_str(&cleaned)
        .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
    parse_decimal(decimal, decimals)
}

/// Convert a `Decimal` (e.g. from a JSON body) into minor units.
pub fn parse_decimal(decimal: Decimal, decimals: u32) -> Result<Amount, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    let normalized = decimal.normalize();
    if normalized.scale() > decimals {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: decimals,
        });
    }

    let multiplier = Decimal::from(10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?);
    let scaled = normalized
        .checked_mul(multiplier)
        .ok_or(MoneyError::Overflow)?;

    scaled.to_u64().ok_or(MoneyError::Overflow)
}

/// Convert minor units back into a `Decimal` with `decimals` scale.
pub fn to_decimal(amount: Amount, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, decimals)
}

/// Format minor units for display and for gateway payloads.
///
/// ```
/// use pesa_wallet::money::format_amount;
/// assert_eq!(format_amount(150_000, 0), "150000");
/// assert_eq!(format_amount(1_250, 2), "12.50");
/// ```
pub fn format_amount(amount: Amount, decimals: u32) -> String {
    to_decimal(amount, decimals).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_shillings() {
        assert_eq!(parse_amount("5000", 0), Ok(5_000));
        assert_eq!(parse_amount(" 150,000 ", 0), Ok(150_000));
    }

    #[test]
    fn test_parse_with_cents() {
        assert_eq!(parse_amount("10.5", 2), Ok(1_050));
        assert_eq!(parse_amount("10.50", 2), Ok(1_050));
        assert_eq!(parse_amount("0.01", 2), Ok(1));
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        assert_eq!(
            parse_amount("10.5", 0),
            Err(MoneyError::PrecisionOverflow {
                provided: 1,
                max: 0
            })
        );
        assert!(matches!(
            parse_amount("1.001", 2),
            Err(MoneyError::PrecisionOverflow { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_positive_and_garbage() {
        assert_eq!(parse_amount("0", 0), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("-10", 0), Err(MoneyError::InvalidAmount));
        assert!(matches!(
            parse_amount("", 0),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("12abc", 0),
            Err(MoneyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5_000, 0), "5000");
        assert_eq!(format_amount(1, 2), "0.01");
        assert_eq!(format_amount(100, 2), "1.00");
    }
}
