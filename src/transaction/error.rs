//! Transaction Error Types

use thiserror::Error;

use super::state::TransactionState;
use super::validation::ValidationError;
use crate::core_types::TransactionId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    // === Validation Errors ===
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // === Gateway Errors ===
    #[error("Gateway declined the request: {message}")]
    GatewayRejected {
        id: TransactionId,
        code: Option<String>,
        message: String,
    },

    #[error("No response from gateway after {attempts} attempt(s)")]
    TransportFailure { id: TransactionId, attempts: u32 },

    #[error("Gateway unavailable (HTTP {status}) after {attempts} attempt(s)")]
    ServerFault {
        id: TransactionId,
        status: u16,
        attempts: u32,
    },

    /// Submitted but the outcome cannot be determined
    #[error("Outcome unknown for transaction {id}: {reason}")]
    Expired { id: TransactionId, reason: String },

    // === State Errors ===
    #[error("Invalid state transition for {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: TransactionId,
        from: TransactionState,
        to: TransactionState,
    },

    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("Status query failed: {0}")]
    StatusUnavailable(String),

    #[error("Wallet session closed")]
    SessionClosed,
}

impl TransactionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Validation(e) => e.code(),
            TransactionError::GatewayRejected { .. } => "GATEWAY_REJECTED",
            TransactionError::TransportFailure { .. } => "TRANSPORT_FAILURE",
            TransactionError::ServerFault { .. } => "SERVER_FAULT",
            TransactionError::Expired { .. } => "STATUS_UNKNOWN",
            TransactionError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            TransactionError::NotFound(_) => "NOT_FOUND",
            TransactionError::StatusUnavailable(_) => "STATUS_UNAVAILABLE",
            TransactionError::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// Message fit for the end user
    pub fn user_message(&self) -> String {
        match self {
            TransactionError::Validation(e) => e.to_string(),
            TransactionError::GatewayRejected { message, .. } => message.clone(),
            TransactionError::TransportFailure { .. } | TransactionError::ServerFault { .. } => {
                "We could not reach the payment service. Please try again.".to_string()
            }
            TransactionError::Expired { .. } => "Status unknown, contact support".to_string(),
            TransactionError::StatusUnavailable(_) => {
                "Could not check the transaction status right now".to_string()
            }
            TransactionError::InvalidStateTransition { .. } | TransactionError::NotFound(_) => {
                "Something went wrong with this transaction".to_string()
            }
            TransactionError::SessionClosed => "Please sign in again".to_string(),
        }
    }

    /// The same request may be submitted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransactionError::TransportFailure { .. } | TransactionError::ServerFault { .. }
        )
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            TransactionError::GatewayRejected { id, .. }
            | TransactionError::TransportFailure { id, .. }
            | TransactionError::ServerFault { id, .. }
            | TransactionError::Expired { id, .. }
            | TransactionError::InvalidStateTransition { id, .. } => Some(*id),
            TransactionError::NotFound(id) => Some(*id),
            TransactionError::Validation(_)
            | TransactionError::StatusUnavailable(_)
            | TransactionError::SessionClosed => None,
        }
    }
}
