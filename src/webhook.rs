//! Webhook receiver
//!
//! `POST /webhooks/mobile-money` accepts the gateway's push notification and
//! hands it to the confirmation watcher. Responses use the `{code, msg, data}`
//! envelope.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core_types::GatewayReference;
use crate::mobile_money::RemoteStatus;
use crate::transaction::TransactionError;
use crate::watcher::{ConfirmationWatcher, WebhookDelivery, outcome_for};

pub const WEBHOOK_PATH: &str = "/webhooks/mobile-money";

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4009;
    pub const RATE_LIMITED: i32 = 4291;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Push notification body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(alias = "gatewayReference", alias = "checkout_request_id")]
    pub reference: String,
    pub status: RemoteStatus,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    /// routed | resolved | deferred | ignored
    pub delivery: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl WebhookAck {
    fn new(delivery: &str, state: Option<String>) -> Self {
        Self {
            delivery: delivery.to_string(),
            state,
        }
    }
}

pub type WebhookResult = (StatusCode, Json<ApiResponse<WebhookAck>>);

pub fn router(watcher: Arc<ConfirmationWatcher>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive_webhook))
        .with_state(watcher)
}

pub async fn receive_webhook(
    State(watcher): State<Arc<ConfirmationWatcher>>,
    Json(payload): Json<WebhookPayload>,
) -> WebhookResult {
    let reference = payload.reference.trim();
    if reference.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                error_codes::INVALID_PARAMETER,
                "reference is required",
            )),
        );
    }

    info!(reference, status = ?payload.status, "Webhook received");
    let Some(outcome) = outcome_for(payload.status, payload.reason) else {
        return (
            StatusCode::OK,
            Json(ApiResponse::success(WebhookAck::new("ignored", None))),
        );
    };

    match watcher
        .deliver_webhook(GatewayReference::new(reference), outcome)
        .await
    {
        Ok(WebhookDelivery::Routed) => (
            StatusCode::OK,
            Json(ApiResponse::success(WebhookAck::new("routed", None))),
        ),
        Ok(WebhookDelivery::Resolved(resolution)) => (
            StatusCode::OK,
            Json(ApiResponse::success(WebhookAck::new(
                "resolved",
                Some(resolution.state().to_string()),
            ))),
        ),
        Ok(WebhookDelivery::Deferred) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::success(WebhookAck::new("deferred", None))),
        ),
        Ok(WebhookDelivery::Discarded) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::error(
                error_codes::RATE_LIMITED,
                "too many notifications for unknown references",
            )),
        ),
        Err(e) => {
            warn!(reference, error = %e, "Webhook not applied");
            let (status, code) = match &e {
                TransactionError::InvalidStateTransition { .. } => {
                    (StatusCode::CONFLICT, error_codes::CONFLICT)
                }
                TransactionError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
                TransactionError::SessionClosed => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    error_codes::SERVICE_UNAVAILABLE,
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                ),
            };
            (status, Json(ApiResponse::error(code, e.to_string())))
        }
    }
}

/// Bind and serve until the task is dropped
pub async fn serve(addr: SocketAddr, watcher: Arc<ConfirmationWatcher>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, path = WEBHOOK_PATH, "Webhook receiver listening");
    axum::serve(listener, router(watcher)).await
}
