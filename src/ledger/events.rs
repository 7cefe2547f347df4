use crate::core_types::{Amount, DocumentId, GatewayReference, TransactionId, UserId};
use crate::kyc::DocumentType;
use crate::transaction::{ResolutionSource, TransactionKind, TransactionState};

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    TransactionCreated {
        transaction_id: TransactionId,
        user_id: UserId,
        kind: TransactionKind,
        amount: Amount,
        /// Human readable, e.g. "Withdrawal of KES 5000 to +254712345678"
        description: String,
    },
    TransactionConfirmed {
        transaction_id: TransactionId,
        reference: Option<GatewayReference>,
    },
    TransactionFailed {
        transaction_id: TransactionId,
        reason: String,
    },
    TransactionExpired {
        transaction_id: TransactionId,
        reason: String,
    },
    /// A resolution conflicted with an already-terminal state
    ResolutionAnomaly {
        transaction_id: TransactionId,
        current: TransactionState,
        attempted: TransactionState,
        source: ResolutionSource,
    },
    DocumentUploaded {
        document_id: DocumentId,
        user_id: UserId,
        document_type: DocumentType,
    },
    DocumentApproved {
        document_id: DocumentId,
        user_id: UserId,
        reviewer: UserId,
    },
    DocumentRejected {
        document_id: DocumentId,
        user_id: UserId,
        reviewer: UserId,
        reason: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::TransactionCreated { .. } => "transaction_created",
            LifecycleEvent::TransactionConfirmed { .. } => "transaction_confirmed",
            LifecycleEvent::TransactionFailed { .. } => "transaction_failed",
            LifecycleEvent::TransactionExpired { .. } => "transaction_expired",
            LifecycleEvent::ResolutionAnomaly { .. } => "resolution_anomaly",
            LifecycleEvent::DocumentUploaded { .. } => "document_uploaded",
            LifecycleEvent::DocumentApproved { .. } => "document_approved",
            LifecycleEvent::DocumentRejected { .. } => "document_rejected",
        }
    }
}

/// Receiver of lifecycle events. Must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: LifecycleEvent);
}
