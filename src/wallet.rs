//! Wallet balance snapshot
//!
//! Mirror of the gateway's balance, used for display and the advisory
//! pre-submission balance check. The client never adjusts it locally;
//! it only changes on `refresh`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::core_types::Amount;
use crate::mobile_money::{GatewayClient, GatewayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub balance: Amount,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct WalletSnapshot {
    inner: RwLock<Option<BalanceSnapshot>>,
}

impl WalletSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(balance: Amount) -> Self {
        let snapshot = Self::new();
        snapshot.set(balance);
        snapshot
    }

    /// Last known balance, `None` before the first refresh
    pub fn balance(&self) -> Option<Amount> {
        self.inner.read().map(|s| s.balance)
    }

    pub fn snapshot(&self) -> Option<BalanceSnapshot> {
        *self.inner.read()
    }

    fn set(&self, balance: Amount) {
        *self.inner.write() = Some(BalanceSnapshot {
            balance,
            refreshed_at: Utc::now(),
        });
    }

    pub async fn refresh(&self, gateway: &GatewayClient) -> Result<Amount, GatewayError> {
        let balance = gateway.wallet_balance().await?;
        let previous = self.balance();
        self.set(balance);
        debug!(?previous, balance, "Wallet balance refreshed");
        Ok(balance)
    }
}
