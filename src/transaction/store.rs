//! In-memory transaction store
//!
//! All state changes go through `update_state_if`, an atomic compare-and-set
//! on the record's state: exactly one of two racing resolutions wins.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::error::TransactionError;
use super::state::TransactionState;
use super::types::{ResolutionSource, Transaction};
use crate::core_types::{GatewayReference, TransactionId, UserId};

/// A resolution that conflicted with an already-terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub transaction_id: TransactionId,
    pub current: TransactionState,
    pub attempted: TransactionState,
    pub source: ResolutionSource,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
pub struct TransactionStore {
    records: DashMap<TransactionId, Transaction>,
    by_reference: DashMap<GatewayReference, TransactionId>,
    anomalies: Mutex<Vec<Anomaly>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction) {
        if let Some(reference) = &tx.gateway_reference {
            self.by_reference.insert(reference.clone(), tx.id);
        }
        self.records.insert(tx.id, tx);
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn find_by_reference(&self, reference: &GatewayReference) -> Option<Transaction> {
        let id = *self.by_reference.get(reference)?;
        self.get(&id)
    }

    pub fn find_by_client_ref(&self, user_id: UserId, client_ref: &str) -> Option<Transaction> {
        self.records
            .iter()
            .find(|r| r.user_id == user_id && r.client_ref.as_deref() == Some(client_ref))
            .map(|r| r.clone())
    }

    /// Newest first
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Transaction> {
        let mut txs: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        txs.sort_by(|a, b| b.id.cmp(&a.id));
        txs
    }

    pub fn non_terminal(&self, user_id: UserId) -> Vec<Transaction> {
        self.list_for_user(user_id)
            .into_iter()
            .filter(|t| !t.state.is_terminal())
            .collect()
    }

    /// Atomic CAS: move to `new_state` only if the record is in `expected`
    /// and the transition is legal. `apply` runs under the same lock.
    ///
    /// Returns `Ok(None)` if the state did not match.
    pub fn update_state_if<F>(
        &self,
        id: &TransactionId,
        expected: TransactionState,
        new_state: TransactionState,
        apply: F,
    ) -> Result<Option<Transaction>, TransactionError>
    where
        F: FnOnce(&mut Transaction),
    {
        let snapshot = {
            let mut record = self
                .records
                .get_mut(id)
                .ok_or(TransactionError::NotFound(*id))?;
            if record.state != expected || !expected.can_transition_to(new_state) {
                return Ok(None);
            }
            let reference_before = record.gateway_reference.clone();
            let now = Utc::now();
            record.state = new_state;
            record.updated_at = now;
            apply(&mut record);
            // The gateway reference is write-once
            if reference_before.is_some() {
                record.gateway_reference = reference_before;
            }
            if new_state.is_terminal() {
                record.resolved_at = Some(now);
            }
            record.clone()
        };

        if let Some(reference) = &snapshot.gateway_reference {
            self.by_reference.insert(reference.clone(), snapshot.id);
        }
        Ok(Some(snapshot))
    }

    pub fn record_anomaly(&self, anomaly: Anomaly) {
        self.anomalies.lock().push(anomaly);
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
