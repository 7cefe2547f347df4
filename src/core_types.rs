//! Core types used throughout the wallet
//!
//! Identifiers shared by the transaction, verification and ledger modules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User ID - assigned by the backend, immutable for the life of the account.
pub type UserId = u64;

/// Amount in minor units of the session currency.
///
/// M-Pesa style wallets settle in whole shillings, so with `decimals = 0`
/// one unit is one KES.
pub type Amount = u64;

/// Local transaction identifier.
///
/// Generated on the device at creation time and never shared with the
/// gateway as its own reference. ULID keeps ids sortable by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Reference issued by the mobile-money gateway when it accepts a request
/// (e.g. an STK-push checkout request id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayReference(String);

impl GatewayReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// KYC document identifier, issued by the backend on upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_roundtrip_and_order() {
        let a = TransactionId::new();
        let parsed: TransactionId = a.to_string().parse().unwrap();
        assert_eq!(a, parsed);

        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TransactionId::new();
        assert!(b > a);
    }

    #[test]
    fn test_reference_serializes_as_plain_string() {
        let reference = GatewayReference::new("REF123");
        assert_eq!(serde_json::to_string(&reference).unwrap(), "\"REF123\"");
        assert_eq!(reference.to_string(), "REF123");
    }
}
