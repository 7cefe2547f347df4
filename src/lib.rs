//! Pesa Wallet - mobile-money wallet client core
//!
//! Drives deposits, withdrawals and transfers through an STK-push gateway
//! where the HTTP acknowledgement is not the final answer.
//!
//! # Modules
//!
//! - [`core_types`] - Identifiers (TransactionId, GatewayReference, etc.)
//! - [`money`] / [`fee`] / [`phone`] - Amount formatting, withdrawal fee, MSISDN canonicalisation
//! - [`session`] - Signed-in user and currency context
//! - [`mobile_money`] - Idempotent gateway client with retry
//! - [`transaction`] - Transaction state machine and orchestrator
//! - [`watcher`] - Confirmation watcher (poll + webhook + deadline)
//! - [`kyc`] - Document verification workflow
//! - [`ledger`] - Lifecycle events and the user-visible activity feed
//! - [`wallet`] - Balance snapshot mirrored from the gateway
//! - [`webhook`] - HTTP receiver for gateway push notifications
//! - [`app`] - Component wiring for one session

// Core types - must be first!
pub mod core_types;

pub mod fee;
pub mod money;
pub mod phone;

pub mod config;
pub mod logging;
pub mod session;

pub mod kyc;
pub mod ledger;
pub mod mobile_money;
pub mod transaction;
pub mod wallet;
pub mod watcher;

pub mod app;
pub mod webhook;

pub use app::WalletApp;
pub use config::AppConfig;
pub use core_types::{Amount, DocumentId, GatewayReference, TransactionId, UserId};
pub use session::{CurrencyContext, SessionContext};
pub use transaction::{
    Outcome, Resolution, StartRequest, Transaction, TransactionError, TransactionKind,
    TransactionOrchestrator, TransactionState,
};
