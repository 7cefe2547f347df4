//! Session context
//!
//! Authentication and currency context for the signed-in actor. It is passed
//! explicitly into the gateway client, the orchestrator and the verification
//! workflow; nothing in the crate reads session state from a global.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, UserId};
use crate::kyc::UserRole;
use crate::money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyContext {
    /// ISO 4217 code, e.g. "KES"
    pub code: String,
    /// Minor-unit decimals used for every `Amount`
    pub decimals: u32,
    /// Display-only conversion rate; never used for settlement
    #[serde(default)]
    pub exchange_rate_to_usd: Option<Decimal>,
}

impl Default for CurrencyContext {
    fn default() -> Self {
        Self {
            code: "KES".to_string(),
            decimals: 0,
            exchange_rate_to_usd: None,
        }
    }
}

impl CurrencyContext {
    /// "KES 5000" style label for activity descriptions.
    pub fn label(&self, amount: Amount) -> String {
        format!("{} {}", self.code, money::format_amount(amount, self.decimals))
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: UserId,
    pub role: UserRole,
    pub auth_token: String,
    pub currency: CurrencyContext,
}

impl SessionContext {
    pub fn new(user_id: UserId, role: UserRole, auth_token: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            auth_token: auth_token.into(),
            currency: CurrencyContext::default(),
        }
    }

    pub fn with_currency(mut self, currency: CurrencyContext) -> Self {
        self.currency = currency;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
