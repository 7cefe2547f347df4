//! Scripted transport for tests
//!
//! Replies are queued per request path; when a queue is empty the path's
//! default reply is used, and with no default the mock answers 404.

use std::collections::{HashMap, VecDeque};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::error::TransportError;
use super::transport::GatewayTransport;
use super::types::{GatewayReply, GatewayRequest};

type Scripted = Result<GatewayReply, TransportError>;

#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(body: Value) -> Scripted {
        Ok(GatewayReply { status: 200, body })
    }

    pub fn reply(status: u16, body: Value) -> Scripted {
        Ok(GatewayReply { status, body })
    }

    /// Queue a one-shot reply for `path`
    pub fn push(&self, path: &str, reply: Scripted) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Reply used for `path` whenever its queue is empty
    pub fn set_default(&self, path: &str, reply: Scripted) {
        self.defaults
            .lock()
            .insert(path.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<GatewayRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl GatewayTransport for MockTransport {
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayReply, TransportError> {
        self.requests.lock().push(request.clone());

        let queued = self
            .queued
            .lock()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }

        if let Some(reply) = self.defaults.lock().get(&request.path) {
            return reply.clone();
        }

        Ok(GatewayReply {
            status: 404,
            body: json!({"success": false, "message": format!("no mock for {}", request.path)}),
        })
    }
}
