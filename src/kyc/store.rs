//! In-memory document store
//!
//! Shared between the user's workflow and a reviewer's workflow in the same
//! process. Decisions go through `decide_if_pending`, a compare-and-set on
//! the document status.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::types::{DocumentStatus, ReviewDecision, VerificationDocument};
use crate::core_types::{DocumentId, UserId};

#[derive(Default)]
pub struct DocumentStore {
    documents: DashMap<DocumentId, VerificationDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: VerificationDocument) {
        self.documents.insert(document.id.clone(), document);
    }

    /// Insert unless a record with this id exists. Returns true if inserted.
    pub fn insert_if_absent(&self, document: VerificationDocument) -> bool {
        match self.documents.entry(document.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(document);
                true
            }
        }
    }

    pub fn get(&self, id: &DocumentId) -> Option<VerificationDocument> {
        self.documents.get(id).map(|d| d.clone())
    }

    /// Full history for a user, oldest upload first
    pub fn for_user(&self, user_id: UserId) -> Vec<VerificationDocument> {
        let mut docs: Vec<_> = self
            .documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.clone())
            .collect();
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        docs
    }

    pub fn pending(&self) -> Vec<VerificationDocument> {
        let mut docs: Vec<_> = self
            .documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Pending)
            .map(|d| d.clone())
            .collect();
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        docs
    }

    /// Apply a decision only if the document is still Pending.
    ///
    /// On conflict returns the status found, which is terminal. Callers
    /// validate the rejection reason first.
    pub(crate) fn decide_if_pending(
        &self,
        id: &DocumentId,
        decision: &ReviewDecision,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> Option<Result<VerificationDocument, DocumentStatus>> {
        let mut doc = self.documents.get_mut(id)?;
        if doc.status != DocumentStatus::Pending {
            return Some(Err(doc.status));
        }
        doc.status = decision.status();
        doc.rejection_reason = match decision {
            ReviewDecision::Approve => None,
            ReviewDecision::Reject { reason } => Some(reason.clone()),
        };
        doc.decided_at = Some(at);
        doc.decided_by = Some(reviewer);
        Some(Ok(doc.clone()))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::DocumentType;

    #[test]
    fn test_decide_is_compare_and_set() {
        let store = DocumentStore::new();
        let id = DocumentId::new("d1");
        store.insert(VerificationDocument::pending(
            id.clone(),
            7,
            DocumentType::NationalId,
            Utc::now(),
        ));

        let approved = store
            .decide_if_pending(&id, &ReviewDecision::Approve, 1, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, DocumentStatus::Approved);
        assert_eq!(approved.decided_by, Some(1));

        let second = store
            .decide_if_pending(
                &id,
                &ReviewDecision::Reject {
                    reason: "late".into(),
                },
                2,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(second, Err(DocumentStatus::Approved));
        assert_eq!(store.get(&id).unwrap().rejection_reason, None);

        assert!(
            store
                .decide_if_pending(&DocumentId::new("nope"), &ReviewDecision::Approve, 1, Utc::now())
                .is_none()
        );
    }

    #[test]
    fn test_insert_if_absent_keeps_local_record() {
        let store = DocumentStore::new();
        let id = DocumentId::new("d1");
        let mut doc = VerificationDocument::pending(id.clone(), 7, DocumentType::Passport, Utc::now());
        store.insert(doc.clone());

        doc.status = DocumentStatus::Rejected;
        assert!(!store.insert_if_absent(doc));
        assert_eq!(store.get(&id).unwrap().status, DocumentStatus::Pending);
        assert_eq!(store.pending().len(), 1);
    }
}
