//! Watch Channel
//!
//! Hand-off of acknowledged transactions from the orchestrator to the
//! confirmation watcher. The orchestrator holds only the sender and the
//! watcher holds the orchestrator weakly, so dropping the orchestrator closes
//! the channel and stops the dispatcher.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::core_types::{GatewayReference, TransactionId};

/// Start observing a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub transaction_id: TransactionId,
    pub reference: GatewayReference,
    /// Remaining observation window, measured from receipt
    pub window: Duration,
}

/// Sender side (owned by the orchestrator)
#[derive(Clone)]
pub struct WatchSender {
    tx: mpsc::Sender<WatchRequest>,
}

impl WatchSender {
    pub async fn send(&self, request: WatchRequest) -> Result<(), String> {
        debug!(
            transaction_id = %request.transaction_id,
            reference = %request.reference,
            "Handing transaction to watcher"
        );
        self.tx
            .send(request)
            .await
            .map_err(|_| "Watch channel closed".to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiver side (owned by the watcher dispatcher)
pub struct WatchReceiver {
    rx: mpsc::Receiver<WatchRequest>,
}

impl WatchReceiver {
    pub async fn recv(&mut self) -> Option<WatchRequest> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WatchRequest> {
        self.rx.try_recv().ok()
    }
}

/// Create a new watch channel pair
pub fn watch_channel(buffer: usize) -> (WatchSender, WatchReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (WatchSender { tx }, WatchReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_close() {
        let (tx, mut rx) = watch_channel(4);
        let request = WatchRequest {
            transaction_id: TransactionId::new(),
            reference: GatewayReference::new("R1"),
            window: Duration::from_secs(300),
        };
        tx.send(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(request.clone()));
        assert_eq!(rx.try_recv(), None);

        drop(rx);
        assert!(tx.is_closed());
        assert!(tx.send(request).await.is_err());
    }
}
