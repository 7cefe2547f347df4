//! Gateway request/response types
//!
//! Request bodies are built once per logical attempt so a retry replays the
//! exact same payload and idempotency key.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::idempotency::IdempotencyKey;
use crate::core_types::{Amount, DocumentId, GatewayReference};
use crate::kyc::{DocumentType, DocumentUpload, ReviewDecision, VerificationDocument};
use crate::money;
use crate::phone::PhoneNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub operation: &'static str,
    pub method: HttpMethod,
    pub path: String,
    pub idempotency_key: Option<IdempotencyKey>,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub status: u16,
    pub body: Value,
}

/// Operations the wallet backend exposes.
#[derive(Debug, Clone)]
pub enum GatewayOperation {
    Deposit {
        phone: PhoneNumber,
        amount: Amount,
    },
    Withdrawal {
        phone: PhoneNumber,
        amount: Amount,
    },
    Transfer {
        recipient: PhoneNumber,
        amount: Amount,
        note: Option<String>,
    },
    TransactionStatus {
        reference: GatewayReference,
    },
    WalletBalance,
    GatewayStatus,
    UploadDocument {
        document_type: DocumentType,
        upload: DocumentUpload,
    },
    PendingDocuments,
    VerifyDocument {
        document_id: DocumentId,
        decision: ReviewDecision,
    },
}

impl GatewayOperation {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayOperation::Deposit { .. } => "deposit",
            GatewayOperation::Withdrawal { .. } => "withdrawal",
            GatewayOperation::Transfer { .. } => "transfer",
            GatewayOperation::TransactionStatus { .. } => "transaction_status",
            GatewayOperation::WalletBalance => "wallet_balance",
            GatewayOperation::GatewayStatus => "gateway_status",
            GatewayOperation::UploadDocument { .. } => "upload_document",
            GatewayOperation::PendingDocuments => "pending_documents",
            GatewayOperation::VerifyDocument { .. } => "verify_document",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            GatewayOperation::TransactionStatus { .. }
                | GatewayOperation::WalletBalance
                | GatewayOperation::GatewayStatus
                | GatewayOperation::PendingDocuments
        )
    }

    /// Build the wire request. `decimals` formats amounts for the payload.
    pub fn to_request(&self, decimals: u32, key: Option<IdempotencyKey>) -> GatewayRequest {
        let (method, path, body) = match self {
            GatewayOperation::Deposit { phone, amount } => (
                HttpMethod::Post,
                "wallet/deposit".to_string(),
                RequestBody::Json(json!({
                    "phone": phone.as_str(),
                    "amount": money::format_amount(*amount, decimals),
                })),
            ),
            GatewayOperation::Withdrawal { phone, amount } => (
                HttpMethod::Post,
                "wallet/withdraw".to_string(),
                RequestBody::Json(json!({
                    "phone": phone.as_str(),
                    "amount": money::format_amount(*amount, decimals),
                })),
            ),
            GatewayOperation::Transfer {
                recipient,
                amount,
                note,
            } => (
                HttpMethod::Post,
                "wallet/transfer".to_string(),
                RequestBody::Json(json!({
                    "recipient_phone": recipient.as_str(),
                    "amount": money::format_amount(*amount, decimals),
                    "note": note.clone().unwrap_or_default(),
                })),
            ),
            GatewayOperation::TransactionStatus { reference } => (
                HttpMethod::Get,
                format!("transactions/{}/status", reference),
                RequestBody::Empty,
            ),
            GatewayOperation::WalletBalance => {
                (HttpMethod::Get, "wallet/balance".to_string(), RequestBody::Empty)
            }
            GatewayOperation::GatewayStatus => {
                (HttpMethod::Get, "mpesa/status".to_string(), RequestBody::Empty)
            }
            GatewayOperation::UploadDocument {
                document_type,
                upload,
            } => (
                HttpMethod::Post,
                "kyc/document".to_string(),
                RequestBody::Multipart(MultipartBody {
                    fields: vec![(
                        "documentType".to_string(),
                        document_type.as_str().to_string(),
                    )],
                    file_field: "file".to_string(),
                    file_name: upload.file_name.clone(),
                    mime_type: upload.mime_type.clone(),
                    bytes: upload.bytes.clone(),
                }),
            ),
            GatewayOperation::PendingDocuments => (
                HttpMethod::Get,
                "kyc/pending-documents".to_string(),
                RequestBody::Empty,
            ),
            GatewayOperation::VerifyDocument {
                document_id,
                decision,
            } => {
                let body = match decision {
                    ReviewDecision::Approve => json!({ "status": "approved" }),
                    ReviewDecision::Reject { reason } => json!({
                        "status": "rejected",
                        "rejection_reason": reason,
                    }),
                };
                (
                    HttpMethod::Post,
                    format!("kyc/document/{}/verify", document_id),
                    RequestBody::Json(body),
                )
            }
        };

        GatewayRequest {
            operation: self.name(),
            method,
            path,
            idempotency_key: key,
            body,
        }
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// `{success, gatewayReference?, message?}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(
        default,
        alias = "gatewayReference",
        alias = "checkout_request_id",
        alias = "CheckoutRequestID"
    )]
    pub gateway_reference: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AckResponse {
    pub fn reference(&self) -> Option<GatewayReference> {
        self.gateway_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(GatewayReference::new)
    }
}

/// Status of a gateway operation as reported by polling or webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    #[serde(alias = "processing")]
    Pending,
    #[serde(alias = "success", alias = "settled")]
    Completed,
    #[serde(alias = "cancelled")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub balance: rust_decimal::Decimal,
}

/// Health check. Consulted opportunistically, never required for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayStatus {
    pub available: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(alias = "documentId")]
    pub document_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingDocumentsResponse {
    pub documents: Vec<VerificationDocument>,
}
