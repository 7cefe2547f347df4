//! Transaction Orchestrator
//!
//! Drives each transaction through its state machine. Persist-before-call:
//! the record is in AWAITING_GATEWAY_ACK before the gateway request leaves,
//! so a crash or cancellation mid-call is visible to `reconcile`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::TransactionError;
use super::state::TransactionState;
use super::store::{Anomaly, TransactionStore};
use super::types::{Outcome, Resolution, ResolutionSource, StartRequest, Transaction, TransactionKind};
use super::validation::{self, TransactionLimits, ValidatedRequest};
use crate::config::AppConfig;
use crate::core_types::{GatewayReference, TransactionId, UserId};
use crate::ledger::{EventSink, LifecycleEvent};
use crate::mobile_money::{AckResponse, GatewayClient, GatewayError, IdempotencyKey};
use crate::session::SessionContext;
use crate::wallet::WalletSnapshot;
use crate::watcher::{WatchRequest, WatchSender, outcome_for};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub limits: TransactionLimits,
    /// Identical submissions inside this window are treated as one
    pub duplicate_window: Duration,
    /// Hard deadline for confirmation after acknowledgement
    pub observation_window: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            limits: TransactionLimits::default(),
            duplicate_window: Duration::from_secs(30),
            observation_window: Duration::from_secs(300),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            limits: config.limits.to_limits(config.withdrawal_fee_rate),
            duplicate_window: config.confirmation.duplicate_window(),
            observation_window: config.confirmation.watcher().observation_window,
        }
    }
}

/// Last submission seen for a fingerprint
#[derive(Debug, Clone)]
struct RecentSubmission {
    transaction_id: TransactionId,
    key: IdempotencyKey,
    at: Instant,
    /// Ended in transport/server failure; a resubmission replays the key
    replay_key: bool,
}

enum Claim {
    Existing(Transaction),
    New(Transaction),
}

pub struct TransactionOrchestrator {
    session: SessionContext,
    gateway: Arc<GatewayClient>,
    store: Arc<TransactionStore>,
    wallet: Arc<WalletSnapshot>,
    sink: Arc<dyn EventSink>,
    watch: WatchSender,
    config: OrchestratorConfig,
    recent: DashMap<String, RecentSubmission>,
}

fn fingerprint(request: &ValidatedRequest) -> String {
    format!(
        "{}|{}|{}|{}",
        request.kind,
        request.amount,
        request.counterparty,
        request.note.as_deref().unwrap_or_default()
    )
}

impl TransactionOrchestrator {
    pub fn new(
        session: SessionContext,
        gateway: Arc<GatewayClient>,
        store: Arc<TransactionStore>,
        wallet: Arc<WalletSnapshot>,
        sink: Arc<dyn EventSink>,
        watch: WatchSender,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session,
            gateway,
            store,
            wallet,
            sink,
            watch,
            config,
            recent: DashMap::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<GatewayClient> {
        &self.gateway
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: TransactionId) -> Result<Transaction, TransactionError> {
        self.store.get(&id).ok_or(TransactionError::NotFound(id))
    }

    pub fn find_by_reference(&self, reference: &GatewayReference) -> Option<Transaction> {
        self.store.find_by_reference(reference)
    }

    /// Newest first
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Transaction> {
        self.store.list_for_user(user_id)
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.store.anomalies()
    }

    /// Submissions still inside the duplicate window
    pub fn recent_submissions(&self) -> usize {
        self.recent.len()
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Validate, record and submit a new transaction.
    ///
    /// Returns the transaction once it is AWAITING_CONFIRMATION (handed to the
    /// watcher) or SETTLED. An identical in-flight submission is returned as-is
    /// without a new gateway call.
    pub async fn start(&self, request: StartRequest) -> Result<Transaction, TransactionError> {
        let validated =
            validation::validate(&request, &self.config.limits, self.wallet.balance())
                .inspect_err(|e| {
                    info!(kind = %request.kind, amount = request.amount, error = %e, "Transaction request refused");
                })?;

        let dedupe_key = match &request.client_ref {
            Some(client_ref) => format!("client:{}", client_ref),
            None => fingerprint(&validated),
        };

        let tx = match self.claim(&dedupe_key, &validated, request.client_ref.clone()) {
            Claim::Existing(existing) => {
                info!(
                    transaction_id = %existing.id,
                    state = %existing.state,
                    "Duplicate submission, returning existing transaction"
                );
                return Ok(existing);
            }
            Claim::New(tx) => tx,
        };

        self.submit(tx, &dedupe_key).await
    }

    /// Atomically decide between an existing transaction and a new record.
    fn claim(
        &self,
        dedupe_key: &str,
        request: &ValidatedRequest,
        client_ref: Option<String>,
    ) -> Claim {
        let by_client = client_ref.is_some();
        let now = Instant::now();
        let window = self.config.duplicate_window;
        self.recent.retain(|_, r| now.duration_since(r.at) <= window);

        match self.recent.entry(dedupe_key.to_string()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get().clone();
                let fresh =
                    by_client || now.duration_since(previous.at) <= self.config.duplicate_window;
                let existing = self.store.get(&previous.transaction_id);

                let key = match existing {
                    Some(existing) if fresh && !existing.state.is_terminal() => {
                        return Claim::Existing(existing);
                    }
                    Some(_) if fresh && previous.replay_key => {
                        debug!(
                            previous = %previous.transaction_id,
                            "Resubmission after transport failure, replaying idempotency key"
                        );
                        previous.key
                    }
                    Some(existing) if by_client => return Claim::Existing(existing),
                    _ => IdempotencyKey::generate(),
                };

                let tx = self.new_record(request, key, client_ref);
                slot.insert(RecentSubmission {
                    transaction_id: tx.id,
                    key: tx.idempotency_key.clone(),
                    at: now,
                    replay_key: false,
                });
                self.store.insert(tx.clone());
                Claim::New(tx)
            }
            Entry::Vacant(slot) => {
                // Client refs outlive the window; the store remembers them
                if let Some(existing) = client_ref
                    .as_deref()
                    .and_then(|r| self.store.find_by_client_ref(self.session.user_id, r))
                {
                    return Claim::Existing(existing);
                }
                let tx = self.new_record(request, IdempotencyKey::generate(), client_ref);
                slot.insert(RecentSubmission {
                    transaction_id: tx.id,
                    key: tx.idempotency_key.clone(),
                    at: now,
                    replay_key: false,
                });
                self.store.insert(tx.clone());
                Claim::New(tx)
            }
        }
    }

    fn new_record(
        &self,
        request: &ValidatedRequest,
        idempotency_key: IdempotencyKey,
        client_ref: Option<String>,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new(),
            user_id: self.session.user_id,
            kind: request.kind,
            amount: request.amount,
            counterparty: request.counterparty.clone(),
            note: request.note.clone(),
            state: TransactionState::Created,
            gateway_reference: None,
            idempotency_key,
            client_ref,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            acknowledged_at: None,
            resolved_at: None,
        }
    }

    fn describe(&self, tx: &Transaction) -> String {
        let direction = match tx.kind {
            TransactionKind::Deposit => "from",
            TransactionKind::Withdrawal | TransactionKind::Transfer => "to",
        };
        format!(
            "{} of {} {} {}",
            tx.kind.label(),
            self.session.currency.label(tx.amount),
            direction,
            tx.counterparty
        )
    }

    async fn submit(&self, tx: Transaction, dedupe_key: &str) -> Result<Transaction, TransactionError> {
        let id = tx.id;

        // Persist-before-call
        let tx = self
            .store
            .update_state_if(
                &id,
                TransactionState::Created,
                TransactionState::AwaitingGatewayAck,
                |_| {},
            )?
            .ok_or(TransactionError::InvalidStateTransition {
                id,
                from: TransactionState::Created,
                to: TransactionState::AwaitingGatewayAck,
            })?;

        self.sink.record(LifecycleEvent::TransactionCreated {
            transaction_id: id,
            user_id: tx.user_id,
            kind: tx.kind,
            amount: tx.amount,
            description: self.describe(&tx),
        });
        info!(
            transaction_id = %id,
            kind = %tx.kind,
            amount = tx.amount,
            key = %tx.idempotency_key,
            "Submitting transaction to gateway"
        );

        let result = match tx.kind {
            TransactionKind::Deposit => {
                self.gateway
                    .deposit(&tx.counterparty, tx.amount, &tx.idempotency_key)
                    .await
            }
            TransactionKind::Withdrawal => {
                self.gateway
                    .withdrawal(&tx.counterparty, tx.amount, &tx.idempotency_key)
                    .await
            }
            TransactionKind::Transfer => {
                self.gateway
                    .transfer(
                        &tx.counterparty,
                        tx.amount,
                        tx.note.as_deref(),
                        &tx.idempotency_key,
                    )
                    .await
            }
        };

        match result {
            Ok(ack) => self.on_ack(tx, ack).await,
            Err(e) => Err(self.on_submit_error(tx, e, dedupe_key).await),
        }
    }

    async fn on_ack(&self, tx: Transaction, ack: AckResponse) -> Result<Transaction, TransactionError> {
        let id = tx.id;
        match ack.reference() {
            Some(reference) => {
                let now = Utc::now();
                let acked = self.store.update_state_if(
                    &id,
                    TransactionState::AwaitingGatewayAck,
                    TransactionState::AwaitingConfirmation,
                    |t| {
                        t.gateway_reference = Some(reference.clone());
                        t.acknowledged_at = Some(now);
                    },
                )?;
                match acked {
                    Some(updated) => {
                        info!(transaction_id = %id, reference = %reference, "Gateway acknowledged transaction");
                        self.hand_off(&updated, self.config.observation_window).await;
                        Ok(updated)
                    }
                    None => {
                        // Resolved by another path while the call was in flight
                        let current = self.get(id)?;
                        warn!(transaction_id = %id, state = %current.state, "Acknowledgement arrived after resolution");
                        Ok(current)
                    }
                }
            }
            None if tx.kind == TransactionKind::Transfer => {
                // Wallet-to-wallet transfers complete synchronously
                self.resolve_logged(id, Outcome::Settled, ResolutionSource::Submission)
                    .await;
                self.get(id)
            }
            None => {
                let reason = "Gateway accepted the request without a reference".to_string();
                self.resolve_logged(
                    id,
                    Outcome::Expired {
                        reason: reason.clone(),
                    },
                    ResolutionSource::Submission,
                )
                .await;
                Err(TransactionError::Expired { id, reason })
            }
        }
    }

    async fn on_submit_error(
        &self,
        tx: Transaction,
        error: GatewayError,
        dedupe_key: &str,
    ) -> TransactionError {
        let id = tx.id;
        if error.is_retryable() {
            if let Some(mut recent) = self.recent.get_mut(dedupe_key) {
                if recent.transaction_id == id {
                    recent.replay_key = true;
                }
            }
        }

        let (outcome, surfaced) = match error {
            GatewayError::Rejected { code, message, .. } => (
                Outcome::Failed {
                    reason: message.clone(),
                },
                TransactionError::GatewayRejected { id, code, message },
            ),
            GatewayError::Transport { attempts, source } => (
                Outcome::Failed {
                    reason: format!("No response from gateway: {}", source),
                },
                TransactionError::TransportFailure { id, attempts },
            ),
            GatewayError::ServerFault {
                status, attempts, ..
            } => (
                Outcome::Failed {
                    reason: format!("Gateway unavailable (HTTP {})", status),
                },
                TransactionError::ServerFault {
                    id,
                    status,
                    attempts,
                },
            ),
            GatewayError::Decode(detail) => {
                let reason = format!("Unreadable gateway acknowledgement: {}", detail);
                (
                    Outcome::Expired {
                        reason: reason.clone(),
                    },
                    TransactionError::Expired { id, reason },
                )
            }
        };

        self.resolve_logged(id, outcome, ResolutionSource::Submission)
            .await;
        surfaced
    }

    async fn hand_off(&self, tx: &Transaction, window: Duration) {
        let Some(reference) = tx.gateway_reference.clone() else {
            return;
        };
        let request = WatchRequest {
            transaction_id: tx.id,
            reference,
            window,
        };
        if let Err(e) = self.watch.send(request).await {
            warn!(
                transaction_id = %tx.id,
                error = %e,
                "Watcher unavailable, transaction left for reconciliation"
            );
        }
    }

    // ========================================================================
    // Resolve
    // ========================================================================

    /// Apply a terminal outcome.
    ///
    /// First terminal write wins. Repeating the same outcome is a no-op;
    /// a different outcome after a terminal state is recorded as an anomaly
    /// and refused.
    pub async fn resolve(
        &self,
        id: TransactionId,
        outcome: Outcome,
        source: ResolutionSource,
    ) -> Result<Resolution, TransactionError> {
        let target = outcome.target_state();
        loop {
            let current = self.get(id)?;

            if current.state.is_terminal() {
                if current.state == target {
                    debug!(transaction_id = %id, state = %target, %source, "Duplicate resolution ignored");
                    return Ok(Resolution::AlreadyResolved(target));
                }
                self.flag_anomaly(&current, target, source, outcome.reason());
                return Err(TransactionError::InvalidStateTransition {
                    id,
                    from: current.state,
                    to: target,
                });
            }

            if !current.state.can_transition_to(target) {
                return Err(TransactionError::InvalidStateTransition {
                    id,
                    from: current.state,
                    to: target,
                });
            }

            let reason = outcome.reason().map(str::to_string);
            let updated = self
                .store
                .update_state_if(&id, current.state, target, |t| t.failure_reason = reason)?;
            match updated {
                Some(updated) => {
                    self.after_resolution(&updated, &outcome, source).await;
                    return Ok(Resolution::Applied(target));
                }
                // Lost the CAS; states only move forward so this terminates
                None => continue,
            }
        }
    }

    async fn resolve_logged(&self, id: TransactionId, outcome: Outcome, source: ResolutionSource) {
        if let Err(e) = self.resolve(id, outcome, source).await {
            warn!(transaction_id = %id, %source, error = %e, "Resolution not applied");
        }
    }

    fn flag_anomaly(
        &self,
        current: &Transaction,
        attempted: TransactionState,
        source: ResolutionSource,
        detail: Option<&str>,
    ) {
        error!(
            transaction_id = %current.id,
            current = %current.state,
            attempted = %attempted,
            %source,
            "Conflicting resolution for terminal transaction"
        );
        self.store.record_anomaly(Anomaly {
            transaction_id: current.id,
            current: current.state,
            attempted,
            source,
            detail: detail.map(str::to_string),
            at: Utc::now(),
        });
        self.sink.record(LifecycleEvent::ResolutionAnomaly {
            transaction_id: current.id,
            current: current.state,
            attempted,
            source,
        });
    }

    async fn after_resolution(&self, tx: &Transaction, outcome: &Outcome, source: ResolutionSource) {
        match outcome {
            Outcome::Settled => {
                info!(transaction_id = %tx.id, %source, "Transaction settled");
                self.sink.record(LifecycleEvent::TransactionConfirmed {
                    transaction_id: tx.id,
                    reference: tx.gateway_reference.clone(),
                });
            }
            Outcome::Failed { reason } => {
                info!(transaction_id = %tx.id, %source, reason = %reason, "Transaction failed");
                self.sink.record(LifecycleEvent::TransactionFailed {
                    transaction_id: tx.id,
                    reason: reason.clone(),
                });
            }
            Outcome::Expired { reason } => {
                warn!(
                    transaction_id = %tx.id,
                    reference = ?tx.gateway_reference,
                    %source,
                    reason = %reason,
                    "Transaction expired with unknown outcome, needs out-of-band reconciliation"
                );
                self.sink.record(LifecycleEvent::TransactionExpired {
                    transaction_id: tx.id,
                    reason: reason.clone(),
                });
            }
        }

        if let Err(e) = self.wallet.refresh(&self.gateway).await {
            warn!(transaction_id = %tx.id, error = %e, "Balance refresh after resolution failed");
        }
    }

    // ========================================================================
    // Reconcile
    // ========================================================================

    /// Re-establish the truth for a non-terminal transaction, e.g. after the
    /// watcher was cancelled while the app was in the background.
    pub async fn reconcile(&self, id: TransactionId) -> Result<TransactionState, TransactionError> {
        let tx = self.get(id)?;
        if tx.state.is_terminal() {
            return Ok(tx.state);
        }
        let window = self.config.observation_window;

        let Some(reference) = tx.gateway_reference.clone() else {
            // Never acknowledged; only the backend can tell what happened
            let idle = (Utc::now() - tx.updated_at).to_std().unwrap_or_default();
            if idle < window {
                return Ok(tx.state);
            }
            return self
                .resolve(
                    id,
                    Outcome::Expired {
                        reason: "Submission outcome unknown".to_string(),
                    },
                    ResolutionSource::Reconcile,
                )
                .await
                .map(|r| r.state());
        };

        let status = self
            .gateway
            .transaction_status(&reference)
            .await
            .map_err(|e| TransactionError::StatusUnavailable(e.to_string()))?;

        if let Some(outcome) = outcome_for(status.status, status.reason) {
            return self
                .resolve(id, outcome, ResolutionSource::Reconcile)
                .await
                .map(|r| r.state());
        }

        let elapsed = tx
            .acknowledged_at
            .map(|at| (Utc::now() - at).to_std().unwrap_or_default())
            .unwrap_or_default();
        if elapsed >= window {
            return self
                .resolve(
                    id,
                    Outcome::Expired {
                        reason: "No confirmation within the observation window".to_string(),
                    },
                    ResolutionSource::Reconcile,
                )
                .await
                .map(|r| r.state());
        }

        info!(transaction_id = %id, remaining_secs = (window - elapsed).as_secs(), "Still pending, watching again");
        self.hand_off(&tx, window - elapsed).await;
        Ok(tx.state)
    }

    /// Reconcile every non-terminal transaction of the session user
    pub async fn reconcile_pending(&self) -> Vec<(TransactionId, Result<TransactionState, TransactionError>)> {
        let mut results = Vec::new();
        for tx in self.store.non_terminal(self.session.user_id) {
            let result = self.reconcile(tx.id).await;
            results.push((tx.id, result));
        }
        results
    }
}
