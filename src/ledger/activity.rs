//! Activity log shown to the user
//!
//! Backed by an in-memory vector; entries are never deleted. Every recorded
//! entry change is also published on a broadcast channel for live UI updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{EventSink, LifecycleEvent};
use crate::core_types::{Amount, DocumentId, TransactionId, UserId};

const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Processing,
    Completed,
    Failed,
    /// Confirmation window elapsed; the money may or may not have moved
    StatusUnknown,
    /// Non-financial notification
    Info,
}

impl EntryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Processing => "Processing",
            EntryStatus::Completed => "Completed",
            EntryStatus::Failed => "Failed",
            EntryStatus::StatusUnknown => "Status unknown, contact support",
            EntryStatus::Info => "Info",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub transaction_id: Option<TransactionId>,
    pub document_id: Option<DocumentId>,
    pub description: String,
    pub amount: Option<Amount>,
    pub status: EntryStatus,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerInner {
    entries: Vec<ActivityEntry>,
    by_transaction: HashMap<TransactionId, usize>,
    anomalies: Vec<LifecycleEvent>,
}

pub struct ActivityLedger {
    inner: RwLock<LedgerInner>,
    notifications: broadcast::Sender<ActivityEntry>,
}

impl Default for ActivityLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLedger {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            inner: RwLock::new(LedgerInner::default()),
            notifications,
        }
    }

    /// Live feed of created and updated entries
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.notifications.subscribe()
    }

    /// Newest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.inner.read().entries.iter().rev().cloned().collect()
    }

    pub fn entries_for(&self, user_id: UserId) -> Vec<ActivityEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn entry_for_transaction(&self, id: &TransactionId) -> Option<ActivityEntry> {
        let inner = self.inner.read();
        inner
            .by_transaction
            .get(id)
            .and_then(|&idx| inner.entries.get(idx))
            .cloned()
    }

    pub fn anomalies(&self) -> Vec<LifecycleEvent> {
        self.inner.read().anomalies.clone()
    }

    fn publish(&self, entry: ActivityEntry) {
        // No subscribers is fine
        let _ = self.notifications.send(entry);
    }

    fn open_transaction_entry(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
        amount: Amount,
        description: String,
    ) {
        let entry = {
            let mut inner = self.inner.write();
            if inner.by_transaction.contains_key(&transaction_id) {
                debug!(%transaction_id, "Activity entry already exists, not duplicating");
                return;
            }
            let now = Utc::now();
            let entry = ActivityEntry {
                id: Uuid::new_v4(),
                user_id,
                transaction_id: Some(transaction_id),
                document_id: None,
                description,
                amount: Some(amount),
                status: EntryStatus::Processing,
                detail: None,
                created_at: now,
                updated_at: now,
            };
            let idx = inner.entries.len();
            inner.entries.push(entry.clone());
            inner.by_transaction.insert(transaction_id, idx);
            entry
        };
        self.publish(entry);
    }

    fn settle_transaction_entry(
        &self,
        transaction_id: TransactionId,
        status: EntryStatus,
        detail: Option<String>,
    ) {
        let updated = {
            let mut inner = self.inner.write();
            let Some(&idx) = inner.by_transaction.get(&transaction_id) else {
                warn!(%transaction_id, ?status, "No activity entry to reconcile");
                return;
            };
            let entry = &mut inner.entries[idx];
            entry.status = status;
            entry.detail = detail;
            entry.updated_at = Utc::now();
            entry.clone()
        };
        self.publish(updated);
    }

    fn append_notification(
        &self,
        user_id: UserId,
        document_id: DocumentId,
        description: String,
        detail: Option<String>,
    ) {
        let now = Utc::now();
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            user_id,
            transaction_id: None,
            document_id: Some(document_id),
            description,
            amount: None,
            status: EntryStatus::Info,
            detail,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().entries.push(entry.clone());
        self.publish(entry);
    }
}

impl EventSink for ActivityLedger {
    fn record(&self, event: LifecycleEvent) {
        debug!(event = event.name(), "Recording lifecycle event");
        match event {
            LifecycleEvent::TransactionCreated {
                transaction_id,
                user_id,
                amount,
                description,
                ..
            } => self.open_transaction_entry(transaction_id, user_id, amount, description),
            LifecycleEvent::TransactionConfirmed { transaction_id, .. } => {
                self.settle_transaction_entry(transaction_id, EntryStatus::Completed, None)
            }
            LifecycleEvent::TransactionFailed {
                transaction_id,
                reason,
            } => self.settle_transaction_entry(transaction_id, EntryStatus::Failed, Some(reason)),
            LifecycleEvent::TransactionExpired {
                transaction_id,
                reason,
            } => self.settle_transaction_entry(
                transaction_id,
                EntryStatus::StatusUnknown,
                Some(reason),
            ),
            anomaly @ LifecycleEvent::ResolutionAnomaly { .. } => {
                info!(?anomaly, "Resolution anomaly recorded");
                self.inner.write().anomalies.push(anomaly);
            }
            LifecycleEvent::DocumentUploaded {
                document_id,
                user_id,
                document_type,
            } => self.append_notification(
                user_id,
                document_id,
                format!("{} submitted for review", document_type.label()),
                None,
            ),
            LifecycleEvent::DocumentApproved {
                document_id,
                user_id,
                ..
            } => self.append_notification(
                user_id,
                document_id,
                "Identity verification approved".to_string(),
                None,
            ),
            LifecycleEvent::DocumentRejected {
                document_id,
                user_id,
                reason,
                ..
            } => self.append_notification(
                user_id,
                document_id,
                "Identity document rejected, please resubmit".to_string(),
                Some(reason),
            ),
        }
    }
}
