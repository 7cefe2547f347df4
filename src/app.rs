//! Application wiring
//!
//! Builds the component graph for one signed-in session. Must be called from
//! inside a tokio runtime: the confirmation watcher's dispatcher is spawned here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core_types::TransactionId;
use crate::kyc::{DocumentStore, VerificationWorkflow};
use crate::ledger::ActivityLedger;
use crate::mobile_money::{GatewayClient, GatewayStatus, GatewayTransport, HttpTransport, TransportError};
use crate::session::SessionContext;
use crate::transaction::{
    OrchestratorConfig, TransactionError, TransactionOrchestrator, TransactionState,
    TransactionStore,
};
use crate::wallet::WalletSnapshot;
use crate::watcher::{ConfirmationWatcher, watch_channel};

const WATCH_CHANNEL_BUFFER: usize = 64;

pub struct WalletApp {
    session: SessionContext,
    gateway: Arc<GatewayClient>,
    wallet: Arc<WalletSnapshot>,
    ledger: Arc<ActivityLedger>,
    transactions: Arc<TransactionStore>,
    documents: Arc<DocumentStore>,
    orchestrator: Arc<TransactionOrchestrator>,
    watcher: Arc<ConfirmationWatcher>,
    verification: VerificationWorkflow,
}

impl WalletApp {
    pub fn new(
        config: &AppConfig,
        session: SessionContext,
        transport: Arc<dyn GatewayTransport>,
    ) -> Self {
        Self::with_documents(config, session, transport, Arc::new(DocumentStore::new()))
    }

    /// Share a document store, e.g. between a user and a reviewer session
    pub fn with_documents(
        config: &AppConfig,
        session: SessionContext,
        transport: Arc<dyn GatewayTransport>,
        documents: Arc<DocumentStore>,
    ) -> Self {
        let gateway = Arc::new(GatewayClient::new(
            transport,
            config.gateway.retry.policy(),
            &session.currency,
        ));
        let wallet = Arc::new(WalletSnapshot::new());
        let ledger = Arc::new(ActivityLedger::new());
        let transactions = Arc::new(TransactionStore::new());

        let (watch_tx, watch_rx) = watch_channel(WATCH_CHANNEL_BUFFER);
        let orchestrator = Arc::new(TransactionOrchestrator::new(
            session.clone(),
            gateway.clone(),
            transactions.clone(),
            wallet.clone(),
            ledger.clone(),
            watch_tx,
            OrchestratorConfig::from_app(config),
        ));
        let watcher = ConfirmationWatcher::spawn(
            &orchestrator,
            watch_rx,
            config.confirmation.watcher(),
        );
        let verification = VerificationWorkflow::new(
            session.clone(),
            gateway.clone(),
            documents.clone(),
            ledger.clone(),
            config.kyc.max_upload_bytes,
        );

        info!(
            user_id = session.user_id,
            role = session.role.as_str(),
            currency = %session.currency.code,
            "Wallet session ready"
        );

        Self {
            session,
            gateway,
            wallet,
            ledger,
            transactions,
            documents,
            orchestrator,
            watcher,
            verification,
        }
    }

    /// Wire against the real backend over HTTP
    pub fn connect(config: &AppConfig, session: SessionContext) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(
            &config.gateway.base_url,
            Duration::from_millis(config.gateway.request_timeout_ms),
            &session,
        )?;
        Ok(Self::new(config, session, Arc::new(transport)))
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<GatewayClient> {
        &self.gateway
    }

    pub fn wallet(&self) -> &Arc<WalletSnapshot> {
        &self.wallet
    }

    pub fn ledger(&self) -> &Arc<ActivityLedger> {
        &self.ledger
    }

    pub fn transactions(&self) -> &Arc<TransactionStore> {
        &self.transactions
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn orchestrator(&self) -> &Arc<TransactionOrchestrator> {
        &self.orchestrator
    }

    pub fn watcher(&self) -> &Arc<ConfirmationWatcher> {
        &self.watcher
    }

    pub fn verification(&self) -> &VerificationWorkflow {
        &self.verification
    }

    /// Health check. Failures are logged, never fatal.
    pub async fn check_gateway(&self) -> Option<GatewayStatus> {
        match self.gateway.gateway_status().await {
            Ok(status) => {
                info!(available = status.available, message = ?status.message, "Gateway status");
                Some(status)
            }
            Err(e) => {
                warn!(error = %e, "Gateway status check failed");
                None
            }
        }
    }

    /// App returned to the foreground: refresh the balance and re-establish
    /// the truth for every transaction left open.
    pub async fn on_foreground(&self) -> Vec<(TransactionId, Result<TransactionState, TransactionError>)> {
        if let Err(e) = self.wallet.refresh(&self.gateway).await {
            warn!(error = %e, "Balance refresh on foreground failed");
        }
        let results = self.orchestrator.reconcile_pending().await;
        info!(reconciled = results.len(), "Foreground reconciliation done");
        results
    }

    /// App went to the background: stop all watchers. Transactions stay as they are.
    pub fn on_background(&self) -> usize {
        let cancelled = self.watcher.cancel_all();
        info!(cancelled, "Watchers stopped for background");
        cancelled
    }
}

impl Drop for WalletApp {
    /// Sign-out. Open transactions keep their state for the next session to reconcile.
    fn drop(&mut self) {
        let cancelled = self.watcher.cancel_all();
        info!(user_id = self.session.user_id, cancelled, "Wallet session closed");
    }
}
