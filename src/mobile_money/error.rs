use thiserror::Error;

/// No usable response was received.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Transport failure after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        source: TransportError,
    },

    #[error("Gateway rejected request: {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Gateway server fault (HTTP {status}) after {attempts} attempt(s): {message}")]
    ServerFault {
        status: u16,
        attempts: u32,
        message: String,
    },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Transport and server faults may be retried with the same key.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. } | GatewayError::ServerFault { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Transport { .. } => "TRANSPORT_FAILURE",
            GatewayError::Rejected { .. } => "GATEWAY_REJECTED",
            GatewayError::ServerFault { .. } => "SERVER_FAULT",
            GatewayError::Decode(_) => "GATEWAY_DECODE",
        }
    }

    pub(crate) fn with_attempts(self, n: u32) -> Self {
        match self {
            GatewayError::Transport { source, .. } => GatewayError::Transport {
                attempts: n,
                source,
            },
            GatewayError::ServerFault {
                status, message, ..
            } => GatewayError::ServerFault {
                status,
                attempts: n,
                message,
            },
            other => other,
        }
    }
}
