//! Phone number canonicalisation
//!
//! Every number sent to the gateway goes through [`canonicalize`] first.
//! Accepted input forms:
//!
//! ```text
//! 0712345678      local
//! 712345678       bare national
//! 254712345678    international without '+'
//! +254712345678   canonical
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const COUNTRY_CODE: &str = "254";
const NATIONAL_LEN: usize = 9;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is empty")]
    Empty,

    #[error("Phone number contains invalid characters: {0}")]
    InvalidCharacters(String),

    #[error("Phone number has an unrecognised format: {0}")]
    InvalidFormat(String),

    #[error("Not a mobile number: {0}")]
    NotMobile(String),
}

/// Canonical `+254XXXXXXXXX` mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// National significant number, without country code.
    pub fn national(&self) -> &str {
        &self.0[1 + COUNTRY_CODE.len()..]
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        canonicalize(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        canonicalize(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

/// Normalise any accepted input form to `+254XXXXXXXXX`.
///
/// Idempotent: canonical input is returned unchanged.
pub fn canonicalize(input: &str) -> Result<PhoneNumber, PhoneError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let (has_plus, digits) = match compact.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::InvalidCharacters(trimmed.to_string()));
    }

    let national = if has_plus {
        digits
            .strip_prefix(COUNTRY_CODE)
            .filter(|n| n.len() == NATIONAL_LEN)
            .ok_or_else(|| PhoneError::InvalidFormat(trimmed.to_string()))?
    } else {
        match digits.len() {
            10 if digits.starts_with('0') => &digits[1..],
            9 => digits,
            12 if digits.starts_with(COUNTRY_CODE) => &digits[COUNTRY_CODE.len()..],
            _ => return Err(PhoneError::InvalidFormat(trimmed.to_string())),
        }
    };

    // Safaricom / Airtel / Telkom mobile ranges: 7xx and 1xx
    if !(national.starts_with('7') || national.starts_with('1')) {
        return Err(PhoneError::NotMobile(trimmed.to_string()));
    }

    Ok(PhoneNumber(format!("+{}{}", COUNTRY_CODE, national)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_form() {
        assert_eq!(canonicalize("0712345678").unwrap().as_str(), "+254712345678");
    }

    #[test]
    fn test_canonical_is_noop() {
        let once = canonicalize("+254712345678").unwrap();
        assert_eq!(once.as_str(), "+254712345678");
        let twice = canonicalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_international_without_plus() {
        assert_eq!(
            canonicalize("254712345678").unwrap().as_str(),
            "+254712345678"
        );
    }

    #[test]
    fn test_bare_national_and_separators() {
        assert_eq!(canonicalize("712345678").unwrap().as_str(), "+254712345678");
        assert_eq!(
            canonicalize(" 0712-345 678 ").unwrap().as_str(),
            "+254712345678"
        );
        assert_eq!(canonicalize("0110345678").unwrap().as_str(), "+254110345678");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(canonicalize("  "), Err(PhoneError::Empty));
        assert!(matches!(
            canonicalize("07123abc78"),
            Err(PhoneError::InvalidCharacters(_))
        ));
        assert!(matches!(
            canonicalize("07123456"),
            Err(PhoneError::InvalidFormat(_))
        ));
        assert!(matches!(
            canonicalize("+255712345678"),
            Err(PhoneError::InvalidFormat(_))
        ));
        assert!(matches!(
            canonicalize("0212345678"),
            Err(PhoneError::NotMobile(_))
        ));
    }

    #[test]
    fn test_serde_canonicalizes() {
        let phone: PhoneNumber = serde_json::from_str("\"0712345678\"").unwrap();
        assert_eq!(phone.as_str(), "+254712345678");
        assert_eq!(phone.national(), "712345678");
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"+254712345678\"");
    }
}
