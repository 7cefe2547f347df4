//! Idempotent Gateway Client
//!
//! Wraps a [`GatewayTransport`] with key management, response classification
//! and bounded retry. Does not touch transaction state.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::GatewayError;
use super::idempotency::IdempotencyKey;
use super::transport::GatewayTransport;
use super::types::{
    AckResponse, BalanceResponse, GatewayOperation, GatewayReply, GatewayStatus,
    PendingDocumentsResponse, StatusResponse, UploadResponse,
};
use crate::core_types::{Amount, DocumentId, GatewayReference};
use crate::kyc::{DocumentType, DocumentUpload, ReviewDecision, VerificationDocument};
use crate::phone::PhoneNumber;
use crate::session::CurrencyContext;

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }
}

pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
    retry: RetryPolicy,
    decimals: u32,
}

/// Map one HTTP exchange to success or a failure class.
fn classify(reply: GatewayReply) -> Result<Value, GatewayError> {
    let status = reply.status;
    let message = reply
        .body
        .get("message")
        .or_else(|| reply.body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let code = reply
        .body
        .get("code")
        .and_then(|c| {
            c.as_str()
                .map(str::to_string)
                .or_else(|| c.as_i64().map(|n| n.to_string()))
        });

    match status {
        500..=599 | 408 | 429 => Err(GatewayError::ServerFault {
            status,
            attempts: 1,
            message: message.unwrap_or_else(|| format!("HTTP {}", status)),
        }),
        400..=499 => Err(GatewayError::Rejected {
            status,
            code,
            message: message.unwrap_or_else(|| format!("HTTP {}", status)),
        }),
        200..=299 => {
            if reply.body.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(GatewayError::Rejected {
                    status,
                    code,
                    message: message.unwrap_or_else(|| "Request declined".to_string()),
                });
            }
            Ok(reply.body)
        }
        other => Err(GatewayError::Decode(format!("unexpected HTTP status {}", other))),
    }
}

fn decode<T: DeserializeOwned>(operation: &str, body: Value) -> Result<T, GatewayError> {
    serde_json::from_value(body)
        .map_err(|e| GatewayError::Decode(format!("{} response: {}", operation, e)))
}

impl GatewayClient {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        retry: RetryPolicy,
        currency: &CurrencyContext,
    ) -> Self {
        Self {
            transport,
            retry,
            decimals: currency.decimals,
        }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Execute one logical attempt.
    ///
    /// Mutating operations without a caller key get a fresh one here; the
    /// same key is replayed on every retry of this call.
    pub async fn call(
        &self,
        operation: &GatewayOperation,
        key: Option<&IdempotencyKey>,
    ) -> Result<Value, GatewayError> {
        let key = if operation.is_mutating() {
            Some(key.cloned().unwrap_or_else(IdempotencyKey::generate))
        } else {
            None
        };
        let request = operation.to_request(self.decimals, key);
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let result = match self.transport.send(&request).await {
                Ok(reply) => classify(reply),
                Err(source) => Err(GatewayError::Transport {
                    attempts: 1,
                    source,
                }),
            };

            match result {
                Ok(body) => {
                    debug!(
                        operation = request.operation,
                        attempt = attempt + 1,
                        key = request.idempotency_key.as_ref().map(IdempotencyKey::as_str),
                        "Gateway call succeeded"
                    );
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let backoff = self.retry.backoff_for_attempt(attempt);
                    warn!(
                        operation = request.operation,
                        attempt = attempt + 1,
                        key = request.idempotency_key.as_ref().map(IdempotencyKey::as_str),
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient gateway failure, retrying with same key"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    let e = e.with_attempts(attempt + 1);
                    info!(
                        operation = request.operation,
                        attempt = attempt + 1,
                        code = e.code(),
                        error = %e,
                        "Gateway call failed"
                    );
                    return Err(e);
                }
            }
        }

        // max_attempts >= 1 so the loop always returns
        Err(GatewayError::Decode("retry loop exhausted".to_string()))
    }

    pub async fn deposit(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        key: &IdempotencyKey,
    ) -> Result<AckResponse, GatewayError> {
        let op = GatewayOperation::Deposit {
            phone: phone.clone(),
            amount,
        };
        decode(op.name(), self.call(&op, Some(key)).await?)
    }

    pub async fn withdrawal(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        key: &IdempotencyKey,
    ) -> Result<AckResponse, GatewayError> {
        let op = GatewayOperation::Withdrawal {
            phone: phone.clone(),
            amount,
        };
        decode(op.name(), self.call(&op, Some(key)).await?)
    }

    pub async fn transfer(
        &self,
        recipient: &PhoneNumber,
        amount: Amount,
        note: Option<&str>,
        key: &IdempotencyKey,
    ) -> Result<AckResponse, GatewayError> {
        let op = GatewayOperation::Transfer {
            recipient: recipient.clone(),
            amount,
            note: note.map(str::to_string),
        };
        decode(op.name(), self.call(&op, Some(key)).await?)
    }

    pub async fn transaction_status(
        &self,
        reference: &GatewayReference,
    ) -> Result<StatusResponse, GatewayError> {
        let op = GatewayOperation::TransactionStatus {
            reference: reference.clone(),
        };
        decode(op.name(), self.call(&op, None).await?)
    }

    /// Authoritative balance in minor units.
    pub async fn wallet_balance(&self) -> Result<Amount, GatewayError> {
        let op = GatewayOperation::WalletBalance;
        let resp: BalanceResponse = decode(op.name(), self.call(&op, None).await?)?;
        if resp.balance.is_sign_negative() {
            return Err(GatewayError::Decode(format!(
                "negative balance {}",
                resp.balance
            )));
        }
        let scale = 10u64
            .checked_pow(self.decimals)
            .map(Decimal::from)
            .ok_or_else(|| GatewayError::Decode(format!("unsupported scale {}", self.decimals)))?;
        (resp.balance * scale)
            .trunc()
            .to_u64()
            .ok_or_else(|| GatewayError::Decode(format!("balance out of range {}", resp.balance)))
    }

    pub async fn gateway_status(&self) -> Result<GatewayStatus, GatewayError> {
        let op = GatewayOperation::GatewayStatus;
        decode(op.name(), self.call(&op, None).await?)
    }

    pub async fn upload_document(
        &self,
        document_type: DocumentType,
        upload: &DocumentUpload,
    ) -> Result<DocumentId, GatewayError> {
        let op = GatewayOperation::UploadDocument {
            document_type,
            upload: upload.clone(),
        };
        let resp: UploadResponse = decode(op.name(), self.call(&op, None).await?)?;
        if !resp.success || resp.document_id.trim().is_empty() {
            return Err(GatewayError::Decode(
                "upload acknowledged without document id".to_string(),
            ));
        }
        Ok(DocumentId::new(resp.document_id))
    }

    pub async fn pending_documents(&self) -> Result<Vec<VerificationDocument>, GatewayError> {
        let op = GatewayOperation::PendingDocuments;
        let resp: PendingDocumentsResponse = decode(op.name(), self.call(&op, None).await?)?;
        Ok(resp.documents)
    }

    pub async fn verify_document(
        &self,
        document_id: &DocumentId,
        decision: &ReviewDecision,
    ) -> Result<(), GatewayError> {
        let op = GatewayOperation::VerifyDocument {
            document_id: document_id.clone(),
            decision: decision.clone(),
        };
        self.call(&op, None).await?;
        Ok(())
    }
}
