//! Transaction Types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::TransactionState;
use crate::core_types::{Amount, GatewayReference, TransactionId, UserId};
use crate::mobile_money::IdempotencyKey;
use crate::phone::PhoneNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// STK push pulling money from the user's phone into the wallet
    Deposit,
    /// Wallet to the user's mobile-money account
    Withdrawal,
    /// Wallet to another user's phone
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Transfer => "transfer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdrawal => "Withdrawal",
            TransactionKind::Transfer => "Transfer",
        }
    }

    /// Debits the wallet balance on success
    pub fn is_debit(&self) -> bool {
        !matches!(self, TransactionKind::Deposit)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Synchronous result of the gateway submission
    Submission,
    Poll,
    Webhook,
    /// Observation window elapsed
    Timeout,
    Reconcile,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionSource::Submission => "submission",
            ResolutionSource::Poll => "poll",
            ResolutionSource::Webhook => "webhook",
            ResolutionSource::Timeout => "timeout",
            ResolutionSource::Reconcile => "reconcile",
        };
        f.write_str(s)
    }
}

/// Terminal outcome reported for a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Settled,
    Failed { reason: String },
    Expired { reason: String },
}

impl Outcome {
    pub fn target_state(&self) -> TransactionState {
        match self {
            Outcome::Settled => TransactionState::Settled,
            Outcome::Failed { .. } => TransactionState::Failed,
            Outcome::Expired { .. } => TransactionState::Expired,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Settled => None,
            Outcome::Failed { reason } | Outcome::Expired { reason } => Some(reason),
        }
    }
}

/// Result of applying a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied(TransactionState),
    /// Same terminal outcome was already recorded; nothing changed
    AlreadyResolved(TransactionState),
}

impl Resolution {
    pub fn state(&self) -> TransactionState {
        match self {
            Resolution::Applied(s) | Resolution::AlreadyResolved(s) => *s,
        }
    }
}

/// User input for a new transaction, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub kind: TransactionKind,
    pub amount: Amount,
    /// Phone in any accepted input form
    pub counterparty: String,
    pub note: Option<String>,
    /// Caller-supplied id for duplicate detection
    pub client_ref: Option<String>,
}

impl StartRequest {
    pub fn new(kind: TransactionKind, amount: Amount, counterparty: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            counterparty: counterparty.into(),
            note: None,
            client_ref: None,
        }
    }

    pub fn deposit(amount: Amount, phone: impl Into<String>) -> Self {
        Self::new(TransactionKind::Deposit, amount, phone)
    }

    pub fn withdrawal(amount: Amount, phone: impl Into<String>) -> Self {
        Self::new(TransactionKind::Withdrawal, amount, phone)
    }

    pub fn transfer(amount: Amount, recipient: impl Into<String>) -> Self {
        Self::new(TransactionKind::Transfer, amount, recipient)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }
}

/// Transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub counterparty: PhoneNumber,
    pub note: Option<String>,
    pub state: TransactionState,
    /// Set once, on acknowledgement
    pub gateway_reference: Option<GatewayReference>,
    pub idempotency_key: IdempotencyKey,
    pub client_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}
