//! Verification Workflow (KYC)
//!
//! Document lifecycle:
//!
//! ```text
//! upload --> Pending --approve--> Approved
//!               |
//!               +----reject-----> Rejected --(new upload)--> Pending
//! ```
//!
//! A new upload of a type supersedes the previous document of that type; the
//! old record stays in history. Status derivation lives in [`policy`] as pure
//! functions so UI code and tests can call it without a gateway.

pub mod error;
pub mod policy;
pub mod store;
pub mod types;
pub mod upload;
pub mod workflow;


pub use error::KycError;
pub use policy::{current_documents, kyc_state, next_required_upload};
pub use store::DocumentStore;
pub use types::{
    DocumentStatus, DocumentType, KycState, KycTier, ReviewDecision, UploadStep, UserRole,
    VerificationDocument,
};
pub use upload::DocumentUpload;
pub use workflow::VerificationWorkflow;
