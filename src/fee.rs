//! Withdrawal fees
//!
//! Rates use 10^6 precision: 10_000 = 1.00%. Deposits and wallet-to-wallet
//! transfers are free; the gateway charges the fee on withdrawals only.

use crate::core_types::Amount;

pub const FEE_PRECISION: u64 = 1_000_000;

/// 10_000 = 1.00%
pub const DEFAULT_WITHDRAWAL_FEE_RATE: u64 = 10_000;

/// Fee for `amount` at `rate`, never zero for a non-zero charge.
///
/// ```
/// use pesa_wallet::fee::calculate_fee;
/// // KES 5,000 at 1.00% = KES 50
/// assert_eq!(calculate_fee(5_000, 10_000), 50);
/// ```
#[inline]
pub fn calculate_fee(amount: Amount, rate: u64) -> Amount {
    let fee = (amount as u128 * rate as u128) / FEE_PRECISION as u128;
    match fee {
        0 if amount > 0 && rate > 0 => 1,
        fee => fee as Amount,
    }
}

/// What a withdrawal takes out of the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalQuote {
    pub amount: Amount,
    pub fee: Amount,
    pub total: Amount,
}

impl WithdrawalQuote {
    /// `None` when amount plus fee does not fit an `Amount`
    pub fn new(amount: Amount, rate: u64) -> Option<Self> {
        let fee = calculate_fee(amount, rate);
        Some(Self {
            amount,
            fee,
            total: amount.checked_add(fee)?,
        })
    }
}
