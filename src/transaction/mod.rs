//! Transaction Orchestrator
//!
//! Deposits, withdrawals and transfers as a finite state machine.
//!
//! # State Machine
//!
//! ```text
//! CREATED ──► AWAITING_GATEWAY_ACK ──► AWAITING_CONFIRMATION ──► SETTLED
//!                     │      │                   │
//!                     │      └──► SETTLED        ├──► FAILED
//!                     │        (transfer, no ref)└──► EXPIRED
//!                     ├──► FAILED   (declined / no response)
//!                     └──► EXPIRED  (acked without reference / unreadable ack)
//! ```
//!
//! Terminal states never change. A conflicting late outcome is logged as an
//! anomaly and refused.
//!
//! # Idempotency
//!
//! Each transaction owns one idempotency key for its gateway call. Identical
//! submissions within the duplicate window return the in-flight transaction;
//! a resubmission after a transport failure replays the failed attempt's key.

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod integration_tests;

pub use error::TransactionError;
pub use orchestrator::{OrchestratorConfig, TransactionOrchestrator};
pub use state::TransactionState;
pub use store::{Anomaly, TransactionStore};
pub use types::{
    Outcome, Resolution, ResolutionSource, StartRequest, Transaction, TransactionKind,
};
pub use validation::{TransactionLimits, ValidatedRequest, ValidationError};
