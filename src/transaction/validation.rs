//! Pre-submission validation
//!
//! Runs before a transaction record exists, so a rejected request never
//! reaches the gateway and never appears in the activity log.

use thiserror::Error;

use super::types::{StartRequest, TransactionKind};
use crate::core_types::Amount;
use crate::fee;
use crate::phone::{self, PhoneError, PhoneNumber};

/// Per-kind `(min, max)` bounds in minor units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLimits {
    pub deposit: (Amount, Amount),
    pub withdrawal: (Amount, Amount),
    pub transfer: (Amount, Amount),
    pub max_note_len: usize,
    /// 10^6 precision
    pub withdrawal_fee_rate: u64,
}

impl Default for TransactionLimits {
    fn default() -> Self {
        Self {
            deposit: (10, 150_000),
            withdrawal: (10, 150_000),
            transfer: (1, 150_000),
            max_note_len: 100,
            withdrawal_fee_rate: fee::DEFAULT_WITHDRAWAL_FEE_RATE,
        }
    }
}

impl TransactionLimits {
    pub fn bounds(&self, kind: TransactionKind) -> (Amount, Amount) {
        match kind {
            TransactionKind::Deposit => self.deposit,
            TransactionKind::Withdrawal => self.withdrawal,
            TransactionKind::Transfer => self.transfer,
        }
    }

    /// Balance needed to submit, fee included for withdrawals
    pub fn required_balance(&self, kind: TransactionKind, amount: Amount) -> Option<Amount> {
        match kind {
            TransactionKind::Deposit => Some(0),
            TransactionKind::Withdrawal => {
                fee::WithdrawalQuote::new(amount, self.withdrawal_fee_rate).map(|q| q.total)
            }
            TransactionKind::Transfer => Some(amount),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount {amount} is below the minimum of {min}")]
    AmountTooSmall { amount: Amount, min: Amount },

    #[error("Amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: Amount, max: Amount },

    #[error("Insufficient balance: need {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Amount would cause overflow")]
    Overflow,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    #[error("Note is too long ({len} characters, max {max})")]
    NoteTooLong { len: usize, max: usize },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ZeroAmount => "INVALID_AMOUNT",
            ValidationError::AmountTooSmall { .. } => "AMOUNT_TOO_SMALL",
            ValidationError::AmountTooLarge { .. } => "AMOUNT_TOO_LARGE",
            ValidationError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ValidationError::Overflow => "OVERFLOW",
            ValidationError::InvalidPhone(_) => "INVALID_PHONE",
            ValidationError::NoteTooLong { .. } => "NOTE_TOO_LONG",
        }
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub counterparty: PhoneNumber,
    pub note: Option<String>,
}

/// Validate a request. `balance` is the last known wallet balance; when it is
/// unknown the balance check is left to the gateway.
pub fn validate(
    request: &StartRequest,
    limits: &TransactionLimits,
    balance: Option<Amount>,
) -> Result<ValidatedRequest, ValidationError> {
    let amount = request.amount;
    if amount == 0 {
        return Err(ValidationError::ZeroAmount);
    }
    let (min, max) = limits.bounds(request.kind);
    if amount < min {
        return Err(ValidationError::AmountTooSmall { amount, min });
    }
    if amount > max {
        return Err(ValidationError::AmountTooLarge { amount, max });
    }

    let counterparty = phone::canonicalize(&request.counterparty)?;

    let note = request
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    if let Some(n) = &note {
        let len = n.chars().count();
        if len > limits.max_note_len {
            return Err(ValidationError::NoteTooLong {
                len,
                max: limits.max_note_len,
            });
        }
    }

    if let Some(available) = balance {
        let required = limits
            .required_balance(request.kind, amount)
            .ok_or(ValidationError::Overflow)?;
        if required > available {
            return Err(ValidationError::InsufficientBalance {
                required,
                available,
            });
        }
    }

    Ok(ValidatedRequest {
        kind: request.kind,
        amount,
        counterparty,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> TransactionLimits {
        TransactionLimits::default()
    }

    #[test]
    fn test_valid_withdrawal_canonicalises_phone() {
        let req = StartRequest::withdrawal(5_000, "0712 345 678");
        let ok = validate(&req, &limits(), Some(10_000)).unwrap();
        assert_eq!(ok.counterparty.as_str(), "+254712345678");
        assert_eq!(ok.amount, 5_000);
    }

    #[test]
    fn test_amount_bounds() {
        let l = limits();
        assert_eq!(
            validate(&StartRequest::deposit(0, "0712345678"), &l, None),
            Err(ValidationError::ZeroAmount)
        );
        assert_eq!(
            validate(&StartRequest::deposit(5, "0712345678"), &l, None),
            Err(ValidationError::AmountTooSmall { amount: 5, min: 10 })
        );
        assert_eq!(
            validate(&StartRequest::transfer(150_001, "0712345678"), &l, None),
            Err(ValidationError::AmountTooLarge {
                amount: 150_001,
                max: 150_000
            })
        );
    }

    #[test]
    fn test_withdrawal_balance_includes_fee() {
        // 1% of 5000 = 50
        let req = StartRequest::withdrawal(5_000, "0712345678");
        assert_eq!(
            validate(&req, &limits(), Some(5_000)),
            Err(ValidationError::InsufficientBalance {
                required: 5_050,
                available: 5_000
            })
        );
        assert!(validate(&req, &limits(), Some(5_050)).is_ok());
    }

    #[test]
    fn test_deposit_ignores_balance_and_unknown_balance_passes() {
        assert!(validate(&StartRequest::deposit(1_000, "0712345678"), &limits(), Some(0)).is_ok());
        assert!(validate(&StartRequest::transfer(1_000, "0712345678"), &limits(), None).is_ok());
    }

    #[test]
    fn test_bad_phone_and_note() {
        let err = validate(&StartRequest::transfer(100, "12345"), &limits(), None).unwrap_err();
        assert_eq!(err.code(), "INVALID_PHONE");

        let long = "x".repeat(101);
        let err = validate(
            &StartRequest::transfer(100, "0712345678").with_note(long),
            &limits(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NoteTooLong { len: 101, max: 100 });

        let blank = validate(
            &StartRequest::transfer(100, "0712345678").with_note("   "),
            &limits(),
            None,
        )
        .unwrap();
        assert_eq!(blank.note, None);
    }
}
