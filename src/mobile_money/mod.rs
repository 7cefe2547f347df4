//! Mobile-Money Gateway Client
//!
//! Outbound calls to the wallet backend and the STK-push gateway behind it.
//!
//! # Failure classes
//!
//! ```text
//! Transport    no response (timeout, connect, reset)   -> retried, same key
//! ServerFault  HTTP 5xx / 408 / 429                     -> retried, same key
//! Rejected     structured business decline             -> surfaced immediately
//! Decode       2xx body we cannot read                 -> surfaced immediately
//! ```
//!
//! # Idempotency
//!
//! Every mutating call carries an [`IdempotencyKey`] in the `Idempotency-Key`
//! header. The key identifies one *logical* attempt: retries of that attempt
//! reuse it, a new user-initiated attempt gets a new one.

pub mod client;
pub mod error;
pub mod idempotency;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{GatewayClient, RetryPolicy};
pub use error::{GatewayError, TransportError};
pub use idempotency::IdempotencyKey;
pub use transport::{GatewayTransport, HttpTransport, IDEMPOTENCY_HEADER};
pub use types::{
    AckResponse, GatewayOperation, GatewayReply, GatewayRequest, GatewayStatus, HttpMethod,
    RemoteStatus, RequestBody, StatusResponse,
};
