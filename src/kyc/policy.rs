//! Pure KYC derivations
//!
//! Both functions look only at the *current* document per type: the latest
//! upload supersedes earlier ones, which stay in history.

use std::collections::HashMap;

use super::types::{DocumentStatus, DocumentType, KycState, UploadStep, UserRole, VerificationDocument};

/// Latest document per type. Ties on `uploaded_at` go to the later slice position.
pub fn current_documents(
    documents: &[VerificationDocument],
) -> HashMap<DocumentType, &VerificationDocument> {
    let mut current: HashMap<DocumentType, &VerificationDocument> = HashMap::new();
    for doc in documents {
        match current.get(&doc.document_type) {
            Some(existing) if existing.uploaded_at > doc.uploaded_at => {}
            _ => {
                current.insert(doc.document_type, doc);
            }
        }
    }
    current
}

/// Next upload the user must make, or `None` while nothing is required.
///
/// Precedence: a rejected required document asks for resubmission; a pending
/// or approved one requires nothing; otherwise the role's baseline document.
pub fn next_required_upload(
    role: UserRole,
    documents: &[VerificationDocument],
) -> Option<UploadStep> {
    let required = role.required_document();
    let current = current_documents(documents);

    match current.get(&required) {
        Some(doc) if doc.status == DocumentStatus::Rejected => Some(UploadStep {
            document_type: required,
            rejection_reason: Some(
                doc.rejection_reason
                    .clone()
                    .unwrap_or_else(|| "No reason given".to_string()),
            ),
        }),
        Some(_) => None,
        None => Some(UploadStep {
            document_type: required,
            rejection_reason: None,
        }),
    }
}

pub fn kyc_state(role: UserRole, documents: &[VerificationDocument]) -> KycState {
    let required = role.required_document();
    let current = current_documents(documents);

    if current
        .values()
        .any(|d| d.status == DocumentStatus::Pending)
    {
        return KycState::UnderReview;
    }

    match current.get(&required) {
        Some(doc) if doc.status == DocumentStatus::Approved => KycState::Verified,
        Some(doc) => KycState::MustResubmit {
            document_type: required,
            reason: doc
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "No reason given".to_string()),
        },
        None => KycState::NotSubmitted { required },
    }
}
