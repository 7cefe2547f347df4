//! Verification Workflow
//!
//! Uploads, reviews and status derivation for KYC documents. The workflow acts
//! for the session it was built with: as document owner when uploading, as
//! reviewer when approving or rejecting.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::error::KycError;
use super::policy;
use super::store::DocumentStore;
use super::types::{
    DocumentStatus, DocumentType, KycState, KycTier, ReviewDecision, UploadStep,
    VerificationDocument,
};
use super::upload::DocumentUpload;
use crate::core_types::DocumentId;
use crate::ledger::{EventSink, LifecycleEvent};
use crate::mobile_money::GatewayClient;
use crate::session::SessionContext;

pub struct VerificationWorkflow {
    session: SessionContext,
    gateway: Arc<GatewayClient>,
    store: Arc<DocumentStore>,
    sink: Arc<dyn EventSink>,
    max_upload_bytes: usize,
}

impl VerificationWorkflow {
    pub fn new(
        session: SessionContext,
        gateway: Arc<GatewayClient>,
        store: Arc<DocumentStore>,
        sink: Arc<dyn EventSink>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            session,
            gateway,
            store,
            sink,
            max_upload_bytes,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// All documents of the session user, oldest first
    pub fn history(&self) -> Vec<VerificationDocument> {
        self.store.for_user(self.session.user_id)
    }

    pub fn next_required_upload(&self) -> Option<UploadStep> {
        policy::next_required_upload(self.session.role, &self.history())
    }

    pub fn kyc_state(&self) -> KycState {
        policy::kyc_state(self.session.role, &self.history())
    }

    pub fn tier(&self) -> KycTier {
        self.kyc_state().tier()
    }

    /// Upload a document for the session user. Creates a Pending record.
    pub async fn upload(
        &self,
        document_type: DocumentType,
        upload: DocumentUpload,
    ) -> Result<VerificationDocument, KycError> {
        upload.validate(self.max_upload_bytes)?;

        let history = self.history();
        let blocking = policy::current_documents(&history)
            .get(&document_type)
            .map(|current| current.status)
            .filter(|status| *status != DocumentStatus::Rejected);
        if let Some(status) = blocking {
            return Err(KycError::UploadNotAllowed {
                document_type,
                status,
            });
        }

        let document_id = self.gateway.upload_document(document_type, &upload).await?;
        let document = VerificationDocument::pending(
            document_id,
            self.session.user_id,
            document_type,
            Utc::now(),
        );
        self.store.insert(document.clone());

        info!(
            user_id = self.session.user_id,
            document_id = %document.id,
            document_type = %document_type,
            size = upload.bytes.len(),
            "KYC document uploaded"
        );
        self.sink.record(LifecycleEvent::DocumentUploaded {
            document_id: document.id.clone(),
            user_id: document.user_id,
            document_type,
        });
        Ok(document)
    }

    pub async fn approve(&self, document_id: &DocumentId) -> Result<VerificationDocument, KycError> {
        self.decide(document_id, ReviewDecision::Approve).await
    }

    /// Reason is trimmed; blank reasons are refused before anything is sent.
    pub async fn reject(
        &self,
        document_id: &DocumentId,
        reason: &str,
    ) -> Result<VerificationDocument, KycError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(KycError::MissingRejectionReason);
        }
        self.decide(
            document_id,
            ReviewDecision::Reject {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn decide(
        &self,
        document_id: &DocumentId,
        decision: ReviewDecision,
    ) -> Result<VerificationDocument, KycError> {
        if !self.session.is_admin() {
            return Err(KycError::NotReviewer);
        }

        let document = self
            .store
            .get(document_id)
            .ok_or_else(|| KycError::DocumentNotFound(document_id.clone()))?;
        if document.user_id == self.session.user_id {
            return Err(KycError::SelfReview);
        }
        if document.status != DocumentStatus::Pending {
            warn!(
                document_id = %document_id,
                status = %document.status,
                "Review of already decided document refused"
            );
            return Err(KycError::InvalidStateTransition {
                id: document_id.clone(),
                status: document.status,
            });
        }

        self.gateway.verify_document(document_id, &decision).await?;

        let reviewer = self.session.user_id;
        let updated = match self
            .store
            .decide_if_pending(document_id, &decision, reviewer, Utc::now())
        {
            Some(Ok(doc)) => doc,
            Some(Err(status)) => {
                // Backend accepted but a concurrent reviewer got here first locally
                error!(
                    document_id = %document_id,
                    status = %status,
                    "Concurrent review decision detected"
                );
                return Err(KycError::InvalidStateTransition {
                    id: document_id.clone(),
                    status,
                });
            }
            None => return Err(KycError::DocumentNotFound(document_id.clone())),
        };

        info!(
            document_id = %document_id,
            user_id = updated.user_id,
            reviewer,
            status = %updated.status,
            "KYC document reviewed"
        );
        let event = match &decision {
            ReviewDecision::Approve => LifecycleEvent::DocumentApproved {
                document_id: document_id.clone(),
                user_id: updated.user_id,
                reviewer,
            },
            ReviewDecision::Reject { reason } => LifecycleEvent::DocumentRejected {
                document_id: document_id.clone(),
                user_id: updated.user_id,
                reviewer,
                reason: reason.clone(),
            },
        };
        self.sink.record(event);
        Ok(updated)
    }

    /// Pull the reviewer queue from the backend into the local store.
    ///
    /// Only Pending records are taken; decided ones go through `approve` or
    /// `reject`. Records already known locally are kept as they are.
    pub async fn sync_pending_documents(&self) -> Result<Vec<VerificationDocument>, KycError> {
        if !self.session.is_admin() {
            return Err(KycError::NotReviewer);
        }
        let remote = self.gateway.pending_documents().await?;
        let fetched = remote.len();
        let (pending, decided): (Vec<_>, Vec<_>) = remote
            .into_iter()
            .partition(|doc| doc.status == DocumentStatus::Pending);
        if !decided.is_empty() {
            warn!(skipped = decided.len(), "Reviewer queue returned decided documents, skipped");
        }
        let added = pending
            .into_iter()
            .filter(|doc| self.store.insert_if_absent(doc.clone()))
            .count();
        info!(fetched, added, "Synced pending KYC documents");
        Ok(self.store.pending())
    }
}
