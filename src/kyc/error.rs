use thiserror::Error;

use super::types::{DocumentStatus, DocumentType};
use crate::core_types::DocumentId;
use crate::mobile_money::GatewayError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KycError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Invalid state transition: document {id} is already {status}")]
    InvalidStateTransition { id: DocumentId, status: DocumentStatus },

    #[error("A rejection reason is required")]
    MissingRejectionReason,

    #[error("Only administrators can review documents")]
    NotReviewer,

    #[error("Reviewers cannot decide on their own documents")]
    SelfReview,

    #[error("A {document_type} document is already {status}")]
    UploadNotAllowed {
        document_type: DocumentType,
        status: DocumentStatus,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl KycError {
    pub fn code(&self) -> &'static str {
        match self {
            KycError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            KycError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            KycError::MissingRejectionReason => "MISSING_REJECTION_REASON",
            KycError::NotReviewer => "FORBIDDEN",
            KycError::SelfReview => "SELF_REVIEW",
            KycError::UploadNotAllowed { .. } => "UPLOAD_NOT_ALLOWED",
            KycError::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            KycError::EmptyFile => "EMPTY_FILE",
            KycError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            KycError::Gateway(e) => e.code(),
        }
    }
}
