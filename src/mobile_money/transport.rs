//! HTTP transport
//!
//! The only place that talks `reqwest`. Anything that does not produce an HTTP
//! status is a [`TransportError`]; status interpretation belongs to the client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::error::TransportError;
use super::types::{GatewayReply, GatewayRequest, HttpMethod, RequestBody};
use crate::session::SessionContext;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Send one request. Must not retry internally.
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayReply, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: &SessionContext,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: session.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayReply, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        if !self.auth_token.is_empty() {
            builder = builder.bearer_auth(&self.auth_token);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(m) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in &m.fields {
                    form = form.text(name.clone(), value.clone());
                }
                let part = reqwest::multipart::Part::bytes(m.bytes.clone())
                    .file_name(m.file_name.clone())
                    .mime_str(&m.mime_type)
                    .map_err(|e| TransportError::Other(format!("Invalid mime type: {}", e)))?;
                builder.multipart(form.part(m.file_field.clone(), part))
            }
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        debug!(
            operation = request.operation,
            path = %request.path,
            status,
            "Gateway HTTP exchange"
        );

        Ok(GatewayReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::UserRole;

    #[test]
    fn test_url_join() {
        let session = SessionContext::new(1, UserRole::Individual, "token");
        let transport =
            HttpTransport::new("http://localhost:9000/api/", Duration::from_secs(5), &session)
                .unwrap();
        assert_eq!(
            transport.url("/wallet/deposit"),
            "http://localhost:9000/api/wallet/deposit"
        );
        assert_eq!(
            transport.url("kyc/pending-documents"),
            "http://localhost:9000/api/kyc/pending-documents"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let session = SessionContext::new(1, UserRole::Individual, "");
        // Port 9 (discard) on loopback is closed in CI containers
        let transport =
            HttpTransport::new("http://127.0.0.1:9", Duration::from_millis(500), &session)
                .unwrap();
        let request = super::super::GatewayOperation::WalletBalance.to_request(0, None);
        let result = transport.send(&request).await;
        assert!(result.is_err());
    }
}
