//! KYC domain types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{DocumentId, UserId};

/// Account role. Decides which baseline document is required and who may review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Individual,
    Institution,
    Admin,
}

impl UserRole {
    /// Baseline identity document for this role
    pub fn required_document(&self) -> DocumentType {
        match self {
            UserRole::Institution => DocumentType::BusinessRegistration,
            UserRole::Individual | UserRole::Admin => DocumentType::NationalId,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Individual => "individual",
            UserRole::Institution => "institution",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" | "user" => Ok(UserRole::Individual),
            "institution" | "business" => Ok(UserRole::Institution),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NationalId,
    Passport,
    UtilityBill,
    BusinessRegistration,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::NationalId,
        DocumentType::Passport,
        DocumentType::UtilityBill,
        DocumentType::BusinessRegistration,
    ];

    /// Wire name used in the multipart `documentType` field
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::NationalId => "national_id",
            DocumentType::Passport => "passport",
            DocumentType::UtilityBill => "utility_bill",
            DocumentType::BusinessRegistration => "business_registration",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::NationalId => "National ID",
            DocumentType::Passport => "Passport",
            DocumentType::UtilityBill => "Utility bill",
            DocumentType::BusinessRegistration => "Business registration certificate",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown document type: {}", s))
    }
}

/// Review status. Approved and Rejected are terminal for that document;
/// a rejected type is re-submitted as a new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocumentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDocument {
    pub id: DocumentId,
    pub user_id: UserId,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    /// Present iff status is Rejected
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decided_by: Option<UserId>,
}

impl VerificationDocument {
    pub fn pending(
        id: DocumentId,
        user_id: UserId,
        document_type: DocumentType,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            document_type,
            status: DocumentStatus::Pending,
            rejection_reason: None,
            uploaded_at,
            decided_at: None,
            decided_by: None,
        }
    }
}

/// Reviewer decision as sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

impl ReviewDecision {
    pub fn status(&self) -> DocumentStatus {
        match self {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject { .. } => DocumentStatus::Rejected,
        }
    }
}

/// What the user should upload next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStep {
    pub document_type: DocumentType,
    /// Reviewer's reason when this is a resubmission
    pub rejection_reason: Option<String>,
}

impl UploadStep {
    pub fn is_resubmission(&self) -> bool {
        self.rejection_reason.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KycState {
    NotSubmitted { required: DocumentType },
    UnderReview,
    Verified,
    MustResubmit {
        document_type: DocumentType,
        reason: String,
    },
}

impl KycState {
    pub fn tier(&self) -> KycTier {
        match self {
            KycState::Verified => KycTier::Verified,
            _ => KycTier::Unverified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KycTier {
    Unverified,
    Verified,
}
