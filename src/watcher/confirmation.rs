//! Confirmation Watcher
//!
//! One task per acknowledged transaction, racing:
//!
//! - webhook delivery (push)
//! - status polling on an interval
//! - the observation-window deadline (-> EXPIRED)
//! - cancellation (transaction stays AWAITING_CONFIRMATION)
//!
//! The first terminal outcome ends the task. Every outcome goes through
//! `TransactionOrchestrator::resolve`, so a loser of the race is either a
//! no-op or a logged anomaly.
//!
//! The watcher holds the orchestrator weakly. The orchestrator owns the watch
//! sender, so once the session drops it the channel closes and the dispatcher
//! exits.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::channel::{WatchReceiver, WatchRequest};
use crate::core_types::{GatewayReference, TransactionId};
use crate::mobile_money::RemoteStatus;
use crate::transaction::{
    Outcome, Resolution, ResolutionSource, TransactionError, TransactionOrchestrator,
};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Deadline after acknowledgement
    pub observation_window: Duration,
    pub poll_interval: Duration,
    /// Cap on webhooks held for references not acknowledged yet
    pub max_held_webhooks: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            observation_window: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
            max_held_webhooks: 256,
        }
    }
}

/// How a watch task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Resolved(ResolutionSource),
    Expired,
    Cancelled,
    /// Another path resolved the transaction first
    AlreadyTerminal,
}

/// What happened to a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDelivery {
    /// Handed to the live watch task
    Routed,
    /// No live task; resolved directly
    Resolved(Resolution),
    /// Reference not known yet; applied when the acknowledgement lands
    Deferred,
    /// Hold buffer full; the sender should retry later
    Discarded,
}

struct ActiveWatch {
    generation: u64,
    reference: GatewayReference,
    push: mpsc::Sender<Outcome>,
    cancel: oneshot::Sender<()>,
}

/// Outcome pushed before its reference was acknowledged
struct HeldWebhook {
    outcome: Outcome,
    received_at: Instant,
}

pub struct ConfirmationWatcher {
    orchestrator: Weak<TransactionOrchestrator>,
    config: WatcherConfig,
    active: DashMap<TransactionId, ActiveWatch>,
    by_reference: DashMap<GatewayReference, TransactionId>,
    early: DashMap<GatewayReference, HeldWebhook>,
    generation: AtomicU64,
}

/// Map a remote status to a terminal outcome; pending maps to none
pub fn outcome_for(status: RemoteStatus, reason: Option<String>) -> Option<Outcome> {
    match status {
        RemoteStatus::Completed => Some(Outcome::Settled),
        RemoteStatus::Failed => Some(Outcome::Failed {
            reason: reason.unwrap_or_else(|| "Declined by gateway".to_string()),
        }),
        RemoteStatus::Pending => None,
    }
}

impl ConfirmationWatcher {
    /// Create the watcher and start its dispatcher on the current runtime.
    pub fn spawn(
        orchestrator: &Arc<TransactionOrchestrator>,
        receiver: WatchReceiver,
        config: WatcherConfig,
    ) -> Arc<Self> {
        let watcher = Arc::new(Self {
            orchestrator: Arc::downgrade(orchestrator),
            config,
            active: DashMap::new(),
            by_reference: DashMap::new(),
            early: DashMap::new(),
            generation: AtomicU64::new(0),
        });
        let dispatcher = watcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(receiver).await });
        watcher
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn orchestrator(&self) -> Result<Arc<TransactionOrchestrator>, TransactionError> {
        self.orchestrator
            .upgrade()
            .ok_or(TransactionError::SessionClosed)
    }

    async fn dispatch(self: Arc<Self>, mut receiver: WatchReceiver) {
        info!("Confirmation watcher started");
        while let Some(request) = receiver.recv().await {
            self.start_watch(request);
        }
        info!("Watch channel closed, dispatcher stopped");
    }

    /// Begin observing one transaction. No-op if it is already watched or terminal.
    pub fn start_watch(self: &Arc<Self>, request: WatchRequest) {
        let id = request.transaction_id;
        let Ok(orchestrator) = self.orchestrator() else {
            debug!(transaction_id = %id, "Session closed, not watching");
            return;
        };

        if let Some((_, held)) = self.early.remove(&request.reference) {
            if held.received_at.elapsed() <= self.config.observation_window {
                info!(transaction_id = %id, "Applying webhook received before acknowledgement");
                tokio::spawn(async move {
                    if let Err(e) = orchestrator
                        .resolve(id, held.outcome, ResolutionSource::Webhook)
                        .await
                    {
                        warn!(transaction_id = %id, error = %e, "Early webhook not applied");
                    }
                });
                return;
            }
            warn!(transaction_id = %id, "Held webhook too old, watching instead");
        }

        match orchestrator.get(id) {
            Ok(tx) if tx.state.is_terminal() => {
                debug!(transaction_id = %id, state = %tx.state, "Not watching terminal transaction");
                return;
            }
            Err(e) => {
                warn!(transaction_id = %id, error = %e, "Not watching unknown transaction");
                return;
            }
            Ok(_) => {}
        }

        let (push_tx, push_rx) = mpsc::channel(4);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        match self.active.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(transaction_id = %id, "Already watching");
                return;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ActiveWatch {
                    generation,
                    reference: request.reference.clone(),
                    push: push_tx,
                    cancel: cancel_tx,
                });
            }
        }
        self.by_reference.insert(request.reference.clone(), id);

        debug!(
            transaction_id = %id,
            reference = %request.reference,
            window_secs = request.window.as_secs(),
            "Watching transaction"
        );
        let watcher = self.clone();
        tokio::spawn(async move { watcher.run_watch(request, generation, push_rx, cancel_rx).await });
    }

    async fn run_watch(
        self: Arc<Self>,
        request: WatchRequest,
        generation: u64,
        mut push_rx: mpsc::Receiver<Outcome>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> WatchExit {
        let id = request.transaction_id;
        let deadline = tokio::time::sleep(request.window);
        tokio::pin!(deadline);

        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                biased;

                _ = &mut cancel_rx => break WatchExit::Cancelled,

                Some(outcome) = push_rx.recv() => {
                    self.apply(id, outcome, ResolutionSource::Webhook).await;
                    break WatchExit::Resolved(ResolutionSource::Webhook);
                }

                _ = &mut deadline => {
                    let outcome = Outcome::Expired {
                        reason: "No confirmation within the observation window".to_string(),
                    };
                    self.apply(id, outcome, ResolutionSource::Timeout).await;
                    break WatchExit::Expired;
                }

                _ = ticker.tick() => {
                    if let Some(exit) = self.poll_once(&request).await {
                        break exit;
                    }
                }
            }
        };

        // Outcomes pushed while we were finishing still go through resolve
        // so conflicts are recorded
        while let Ok(late) = push_rx.try_recv() {
            self.apply(id, late, ResolutionSource::Webhook).await;
        }

        self.active.remove_if(&id, |_, w| w.generation == generation);
        self.by_reference
            .remove_if(&request.reference, |_, tx_id| *tx_id == id && !self.active.contains_key(&id));
        debug!(transaction_id = %id, ?exit, "Watch finished");
        exit
    }

    async fn poll_once(&self, request: &WatchRequest) -> Option<WatchExit> {
        let id = request.transaction_id;
        let Ok(orchestrator) = self.orchestrator() else {
            return Some(WatchExit::Cancelled);
        };
        match orchestrator.get(id) {
            Ok(tx) if tx.state.is_terminal() => return Some(WatchExit::AlreadyTerminal),
            Ok(_) => {}
            Err(_) => return Some(WatchExit::AlreadyTerminal),
        }

        match orchestrator
            .gateway()
            .transaction_status(&request.reference)
            .await
        {
            Ok(status) => {
                let outcome = outcome_for(status.status, status.reason)?;
                self.apply(id, outcome, ResolutionSource::Poll).await;
                Some(WatchExit::Resolved(ResolutionSource::Poll))
            }
            Err(e) => {
                // Keep waiting; the deadline bounds how long
                warn!(transaction_id = %id, error = %e, "Status poll failed");
                None
            }
        }
    }

    async fn apply(&self, id: TransactionId, outcome: Outcome, source: ResolutionSource) {
        let result = match self.orchestrator() {
            Ok(orchestrator) => orchestrator.resolve(id, outcome, source).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(transaction_id = %id, %source, error = %e, "Watcher resolution not applied");
        }
    }

    /// Route a pushed outcome to the live watch task, or resolve directly.
    pub async fn deliver_webhook(
        &self,
        reference: GatewayReference,
        outcome: Outcome,
    ) -> Result<WebhookDelivery, TransactionError> {
        let orchestrator = self.orchestrator()?;
        if let Some(result) = self
            .deliver_known(&orchestrator, &reference, outcome.clone())
            .await
        {
            return result;
        }

        if !self.hold(reference.clone(), outcome) {
            return Ok(WebhookDelivery::Discarded);
        }

        // The acknowledgement may have landed between the lookup and the hold,
        // after start_watch already checked for held outcomes
        if orchestrator.find_by_reference(&reference).is_some() {
            if let Some((_, held)) = self.early.remove(&reference) {
                debug!(reference = %reference, "Reference acknowledged while holding webhook");
                if let Some(result) = self
                    .deliver_known(&orchestrator, &reference, held.outcome)
                    .await
                {
                    return result;
                }
            }
        }
        Ok(WebhookDelivery::Deferred)
    }

    /// Route to the live task or resolve; `None` if the reference is unknown
    async fn deliver_known(
        &self,
        orchestrator: &TransactionOrchestrator,
        reference: &GatewayReference,
        outcome: Outcome,
    ) -> Option<Result<WebhookDelivery, TransactionError>> {
        if let Some(push) = self.live_sender(reference) {
            if push.try_send(outcome.clone()).is_ok() {
                debug!(reference = %reference, "Webhook routed to watch task");
                return Some(Ok(WebhookDelivery::Routed));
            }
        }
        let tx = orchestrator.find_by_reference(reference)?;
        Some(
            orchestrator
                .resolve(tx.id, outcome, ResolutionSource::Webhook)
                .await
                .map(WebhookDelivery::Resolved),
        )
    }

    /// Hold an outcome for a reference not acknowledged yet. Entries older
    /// than the observation window are dropped first; returns false when full.
    fn hold(&self, reference: GatewayReference, outcome: Outcome) -> bool {
        let ttl = self.config.observation_window;
        self.early.retain(|_, held| held.received_at.elapsed() <= ttl);

        if self.early.len() >= self.config.max_held_webhooks
            && !self.early.contains_key(&reference)
        {
            warn!(
                reference = %reference,
                held = self.early.len(),
                "Too many webhooks for unknown references, discarding"
            );
            return false;
        }

        info!(reference = %reference, "Webhook for unknown reference held until acknowledgement");
        self.early.insert(
            reference,
            HeldWebhook {
                outcome,
                received_at: Instant::now(),
            },
        );
        true
    }

    pub fn held_count(&self) -> usize {
        self.early.len()
    }

    fn live_sender(&self, reference: &GatewayReference) -> Option<mpsc::Sender<Outcome>> {
        let id = *self.by_reference.get(reference)?;
        self.active.get(&id).map(|w| w.push.clone())
    }

    /// Stop watching. The transaction keeps its state; `reconcile` picks it up later.
    pub fn cancel(&self, id: TransactionId) -> bool {
        match self.active.remove(&id) {
            Some((_, watch)) => {
                self.by_reference.remove(&watch.reference);
                let _ = watch.cancel.send(());
                info!(transaction_id = %id, "Watch cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every watch, e.g. when the app is backgrounded
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TransactionId> = self.active.iter().map(|w| *w.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn is_watching(&self, id: TransactionId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
