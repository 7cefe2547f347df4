//! Integration Tests for the Transaction Orchestrator
//!
//! Full flows through `WalletApp`: orchestrator, watcher, ledger and wallet
//! snapshot wired together over a scripted MockTransport. Time is paused so
//! observation windows and poll intervals are deterministic.

#[cfg(test)]
mod integration_tests {
    use std::sync::{Arc, OnceLock};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::app::WalletApp;
    use crate::config::{AppConfig, ConfirmationConfig, RetryConfig};
    use crate::core_types::{GatewayReference, TransactionId};
    use crate::kyc::UserRole;
    use crate::ledger::{ActivityLedger, EntryStatus};
    use crate::mobile_money::mock::MockTransport;
    use crate::mobile_money::{
        GatewayReply, GatewayRequest, GatewayTransport, TransportError,
    };
    use crate::session::SessionContext;
    use crate::transaction::{
        Outcome, Resolution, ResolutionSource, StartRequest, TransactionError,
        TransactionState, TransactionStore, ValidationError,
    };
    use crate::watcher::WebhookDelivery;

    const USER: u64 = 42;
    const PHONE: &str = "0712345678";

    fn test_config() -> AppConfig {
        AppConfig {
            confirmation: ConfirmationConfig {
                observation_window_secs: 300,
                poll_interval_secs: 10,
                duplicate_window_secs: 30,
                max_held_webhooks: 8,
            },
            gateway: crate::config::GatewayConfig {
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_backoff_ms: 10,
                    max_backoff_ms: 50,
                },
                ..Default::default()
            },
            ..AppConfig::default()
        }
    }

    struct TestHarness {
        app: WalletApp,
        mock: Arc<MockTransport>,
    }

    impl TestHarness {
        fn new() -> Self {
            let mock = Arc::new(MockTransport::new());
            Self::with_transport(mock.clone(), mock)
        }

        fn with_transport(mock: Arc<MockTransport>, transport: Arc<dyn GatewayTransport>) -> Self {
            mock.set_default("wallet/balance", MockTransport::ok(json!({"balance": 10000})));
            mock.set_default(
                "transactions/REF1/status",
                MockTransport::ok(json!({"status": "pending"})),
            );
            let session = SessionContext::new(USER, UserRole::Individual, "token");
            let app = WalletApp::new(&test_config(), session, transport);
            Self { app, mock }
        }

        fn ack(&self, path: &str, reference: &str) {
            self.mock.push(
                path,
                MockTransport::ok(json!({"success": true, "gatewayReference": reference})),
            );
        }

        fn state(&self, id: TransactionId) -> TransactionState {
            self.app.orchestrator().get(id).unwrap().state
        }

        fn entry_status(&self, id: TransactionId) -> Option<EntryStatus> {
            self.app.ledger().entry_for_transaction(&id).map(|e| e.status)
        }

        /// Let background tasks run; advances paused time in small steps
        async fn wait_for_state(&self, id: TransactionId, state: TransactionState) {
            for _ in 0..50 {
                if self.state(id) == state {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            panic!("{} never reached {}, is {}", id, state, self.state(id));
        }

        async fn wait_until_watching(&self, id: TransactionId) {
            for _ in 0..50 {
                if self.app.watcher().is_watching(id) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("{} never watched", id);
        }
    }

    /// Records store and ledger state at the moment a withdrawal request leaves
    struct InFlightRecorder {
        inner: Arc<MockTransport>,
        parts: OnceLock<(Arc<TransactionStore>, Arc<ActivityLedger>)>,
        observed: Mutex<Vec<(TransactionState, Option<EntryStatus>, usize)>>,
    }

    #[async_trait]
    impl GatewayTransport for InFlightRecorder {
        async fn send(&self, request: &GatewayRequest) -> Result<GatewayReply, TransportError> {
            if request.path == "wallet/withdraw" {
                if let Some((store, ledger)) = self.parts.get() {
                    for tx in store.list_for_user(USER) {
                        self.observed.lock().push((
                            tx.state,
                            ledger.entry_for_transaction(&tx.id).map(|e| e.status),
                            ledger.entries().len(),
                        ));
                    }
                }
            }
            self.inner.send(request).await
        }
    }

    // ========================================================================
    // Happy path
    // ========================================================================

    /// Withdrawal of 5000 with balance 10000, confirmed by webhook
    #[tokio::test(start_paused = true)]
    async fn test_withdrawal_confirmed_by_webhook() {
        let mock = Arc::new(MockTransport::new());
        let recorder = Arc::new(InFlightRecorder {
            inner: mock.clone(),
            parts: OnceLock::new(),
            observed: Mutex::new(Vec::new()),
        });
        let h = TestHarness::with_transport(mock, recorder.clone());
        let _ = recorder.parts.set((h.app.transactions().clone(), h.app.ledger().clone()));
        h.app.wallet().refresh(h.app.gateway()).await.unwrap();
        assert_eq!(h.app.wallet().balance(), Some(10_000));
        // Gateway side after settlement: 5,000 plus the 1% fee gone
        h.mock.push("wallet/balance", MockTransport::ok(json!({"balance": 4950})));
        h.ack("wallet/withdraw", "REF1");

        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::withdrawal(5_000, PHONE))
            .await
            .unwrap();

        // While the call was in flight: AWAITING_GATEWAY_ACK with one pending entry
        assert_eq!(
            *recorder.observed.lock(),
            vec![(TransactionState::AwaitingGatewayAck, Some(EntryStatus::Processing), 1)]
        );

        assert_eq!(tx.state, TransactionState::AwaitingConfirmation);
        assert_eq!(tx.gateway_reference, Some(GatewayReference::new("REF1")));
        assert_eq!(tx.counterparty.as_str(), "+254712345678");
        let sent = h.mock.requests_to("wallet/withdraw");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].idempotency_key.as_ref(), Some(&tx.idempotency_key));

        h.wait_until_watching(tx.id).await;
        let delivery = h
            .app
            .watcher()
            .deliver_webhook(GatewayReference::new("REF1"), Outcome::Settled)
            .await
            .unwrap();
        assert_eq!(delivery, WebhookDelivery::Routed);

        h.wait_for_state(tx.id, TransactionState::Settled).await;
        assert_eq!(h.entry_status(tx.id), Some(EntryStatus::Completed));
        assert_eq!(h.app.ledger().entries().len(), 1);
        // Balance refreshed from the gateway, never adjusted locally
        assert_eq!(h.mock.count("wallet/balance"), 2);
        assert_eq!(h.app.wallet().balance(), Some(4_950));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_confirmed_by_poll() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        h.mock.push(
            "transactions/REF1/status",
            MockTransport::ok(json!({"status": "pending"})),
        );
        h.mock.push(
            "transactions/REF1/status",
            MockTransport::ok(json!({"status": "completed"})),
        );

        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        h.wait_until_watching(tx.id).await;

        // Two poll intervals
        tokio::time::sleep(Duration::from_secs(21)).await;
        h.wait_for_state(tx.id, TransactionState::Settled).await;
        assert_eq!(h.mock.count("transactions/REF1/status"), 2);
        assert!(!h.app.watcher().is_watching(tx.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_without_reference_settles_immediately() {
        let h = TestHarness::new();
        h.mock.push(
            "wallet/transfer",
            MockTransport::ok(json!({"success": true, "message": "Transfer successful"})),
        );

        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::transfer(500, "+254798765432").with_note("lunch"))
            .await
            .unwrap();

        assert_eq!(tx.state, TransactionState::Settled);
        assert_eq!(h.entry_status(tx.id), Some(EntryStatus::Completed));
        assert!(!h.app.watcher().is_watching(tx.id));
        match &h.mock.requests_to("wallet/transfer")[0].body {
            crate::mobile_money::RequestBody::Json(body) => {
                assert_eq!(body["note"], Value::from("lunch"));
                assert_eq!(body["recipient_phone"], Value::from("+254798765432"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    // ========================================================================
    // Timeout and late outcomes
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_no_confirmation_expires_and_late_webhook_is_anomaly() {
        let h = TestHarness::new();
        h.ack("wallet/withdraw", "REF1");

        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::withdrawal(5_000, PHONE))
            .await
            .unwrap();
        h.wait_until_watching(tx.id).await;

        tokio::time::sleep(Duration::from_secs(301)).await;
        h.wait_for_state(tx.id, TransactionState::Expired).await;
        assert_eq!(h.entry_status(tx.id), Some(EntryStatus::StatusUnknown));
        assert!(!h.app.watcher().is_watching(tx.id));
        // Unknown outcome: the balance mirrors the gateway, no local debit
        assert_eq!(h.app.wallet().balance(), Some(10_000));

        // Webhook reporting success arrives after expiry
        let err = h
            .app
            .watcher()
            .deliver_webhook(GatewayReference::new("REF1"), Outcome::Settled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidStateTransition {
                from: TransactionState::Expired,
                to: TransactionState::Settled,
                ..
            }
        ));
        assert_eq!(h.state(tx.id), TransactionState::Expired);

        let anomalies = h.app.orchestrator().anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].source, ResolutionSource::Webhook);
        assert_eq!(h.app.ledger().anomalies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_outcome_twice_is_idempotent() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();

        let orchestrator = h.app.orchestrator();
        let (a, b) = tokio::join!(
            orchestrator.resolve(tx.id, Outcome::Settled, ResolutionSource::Webhook),
            orchestrator.resolve(tx.id, Outcome::Settled, ResolutionSource::Poll),
        );
        let mut results = vec![a.unwrap(), b.unwrap()];
        results.sort_by_key(|r| matches!(r, Resolution::AlreadyResolved(_)));
        assert_eq!(
            results,
            vec![
                Resolution::Applied(TransactionState::Settled),
                Resolution::AlreadyResolved(TransactionState::Settled)
            ]
        );
        assert!(orchestrator.anomalies().is_empty());
        assert_eq!(h.app.ledger().entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_unknown_transaction() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        let err = h
            .app
            .orchestrator()
            .resolve(TransactionId::new(), Outcome::Settled, ResolutionSource::Webhook)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::NotFound(_)));
        assert_eq!(h.state(tx.id), TransactionState::AwaitingConfirmation);
    }

    // ========================================================================
    // Gateway failures
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_rejection_fails_without_retry() {
        let h = TestHarness::new();
        h.mock.push(
            "wallet/withdraw",
            MockTransport::ok(json!({"success": false, "message": "Insufficient funds"})),
        );

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::withdrawal(5_000, PHONE))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Insufficient funds");
        let id = err.transaction_id().unwrap();
        assert_eq!(h.state(id), TransactionState::Failed);
        assert_eq!(h.mock.count("wallet/withdraw"), 1);
        let entry = h.app.ledger().entry_for_transaction(&id).unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.detail.as_deref(), Some("Insufficient funds"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_then_resubmit_replays_key() {
        let h = TestHarness::new();
        for _ in 0..3 {
            h.mock.push("wallet/withdraw", Err(TransportError::Timeout));
        }

        let request = StartRequest::withdrawal(5_000, PHONE);
        let err = h
            .app
            .orchestrator()
            .start(request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::TransportFailure { attempts: 3, .. }));
        assert!(err.user_message().contains("try again"));
        let failed_id = err.transaction_id().unwrap();
        assert_eq!(h.state(failed_id), TransactionState::Failed);

        let first_key = h.mock.requests_to("wallet/withdraw")[0]
            .idempotency_key
            .clone()
            .unwrap();

        h.ack("wallet/withdraw", "REF1");
        let retried = h.app.orchestrator().start(request).await.unwrap();
        assert_ne!(retried.id, failed_id);
        assert_eq!(retried.idempotency_key, first_key);

        let sent = h.mock.requests_to("wallet/withdraw");
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|r| r.idempotency_key.as_ref() == Some(&first_key)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_fault_then_different_request_gets_new_key() {
        let h = TestHarness::new();
        h.mock.set_default("wallet/deposit", MockTransport::reply(503, json!({})));

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SERVER_FAULT");
        let first_key = h.mock.requests_to("wallet/deposit")[0]
            .idempotency_key
            .clone()
            .unwrap();

        // A different request is a new logical attempt
        h.ack("wallet/deposit", "REF2");
        let other = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(2_000, PHONE))
            .await
            .unwrap();
        assert_ne!(other.idempotency_key, first_key);
        assert_eq!(h.mock.count("wallet/deposit"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_ack_without_reference_is_status_unknown() {
        let h = TestHarness::new();
        h.mock.push("wallet/deposit", MockTransport::ok(json!({"success": true})));

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STATUS_UNKNOWN");
        let id = err.transaction_id().unwrap();
        assert_eq!(h.state(id), TransactionState::Expired);
        assert_eq!(h.entry_status(id), Some(EntryStatus::StatusUnknown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_ack_is_status_unknown() {
        let h = TestHarness::new();
        h.mock.push("wallet/withdraw", MockTransport::ok(json!("<html>ok</html>")));

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::withdrawal(100, PHONE))
            .await
            .unwrap_err();
        let id = err.transaction_id().unwrap();
        assert_eq!(h.state(id), TransactionState::Expired);
        assert_eq!(h.mock.count("wallet/withdraw"), 1);
    }

    // ========================================================================
    // Validation and duplicates
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_makes_no_call_and_no_entry() {
        let h = TestHarness::new();
        h.app.wallet().refresh(h.app.gateway()).await.unwrap();

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::withdrawal(10_000, PHONE))
            .await
            .unwrap_err();
        // 10000 + 1% fee exceeds the 10000 balance
        assert_eq!(
            err,
            TransactionError::Validation(ValidationError::InsufficientBalance {
                required: 10_100,
                available: 10_000
            })
        );

        let err = h
            .app
            .orchestrator()
            .start(StartRequest::transfer(100, "not a phone"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PHONE");

        assert_eq!(h.mock.count("wallet/withdraw"), 0);
        assert_eq!(h.mock.count("wallet/transfer"), 0);
        assert!(h.app.ledger().entries().is_empty());
        assert!(h.app.orchestrator().list_for_user(USER).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_submit_returns_same_transaction() {
        let h = TestHarness::new();
        h.ack("wallet/withdraw", "REF1");
        let orchestrator = h.app.orchestrator();

        let request = StartRequest::withdrawal(5_000, "+254712345678");
        let same_in_other_format = StartRequest::withdrawal(5_000, "0712 345 678");
        let (a, b) = tokio::join!(
            orchestrator.start(request),
            orchestrator.start(same_in_other_format)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        assert_eq!(h.mock.count("wallet/withdraw"), 1);
        assert_eq!(orchestrator.list_for_user(USER).len(), 1);
        assert_eq!(h.app.ledger().entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_ref_dedupes_and_window_expiry_allows_repeat() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        h.ack("wallet/deposit", "REF2");
        let orchestrator = h.app.orchestrator();

        let first = orchestrator
            .start(StartRequest::deposit(1_000, PHONE).with_client_ref("btn-1"))
            .await
            .unwrap();
        let again = orchestrator
            .start(StartRequest::deposit(1_000, PHONE).with_client_ref("btn-1"))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(h.mock.count("wallet/deposit"), 1);

        // Same amount and phone after the duplicate window is a new deposit
        let plain = orchestrator
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        assert_ne!(plain.id, first.id);
        tokio::time::sleep(Duration::from_secs(31)).await;
        h.ack("wallet/deposit", "REF3");
        let later = orchestrator
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        assert_ne!(later.id, plain.id);
        assert_ne!(later.idempotency_key, plain.idempotency_key);
        assert_eq!(h.mock.count("wallet/deposit"), 3);
        // Entries older than the window were pruned
        assert_eq!(orchestrator.recent_submissions(), 1);

        // The client ref still dedupes once its window entry is gone
        let replayed = orchestrator
            .start(StartRequest::deposit(1_000, PHONE).with_client_ref("btn-1"))
            .await
            .unwrap();
        assert_eq!(replayed.id, first.id);
        assert_eq!(h.mock.count("wallet/deposit"), 3);
        assert_eq!(orchestrator.recent_submissions(), 1);
    }

    // ========================================================================
    // Cancellation, reconciliation, early webhooks
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_reconcile() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        h.wait_until_watching(tx.id).await;

        assert_eq!(h.app.on_background(), 1);
        assert!(!h.app.watcher().is_watching(tx.id));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.state(tx.id), TransactionState::AwaitingConfirmation);
        let polls_while_cancelled = h.mock.count("transactions/REF1/status");
        assert_eq!(polls_while_cancelled, 0);

        h.mock.push(
            "transactions/REF1/status",
            MockTransport::ok(json!({"status": "completed"})),
        );
        let results = h.app.on_foreground().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, Ok(TransactionState::Settled));
        assert_eq!(h.entry_status(tx.id), Some(EntryStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_still_pending_rewatches() {
        let h = TestHarness::new();
        h.ack("wallet/deposit", "REF1");
        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        h.wait_until_watching(tx.id).await;
        assert!(h.app.watcher().cancel(tx.id));
        assert!(!h.app.watcher().cancel(tx.id));

        let state = h.app.orchestrator().reconcile(tx.id).await.unwrap();
        assert_eq!(state, TransactionState::AwaitingConfirmation);
        h.wait_until_watching(tx.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_before_acknowledgement_is_applied() {
        let h = TestHarness::new();
        let delivery = h
            .app
            .watcher()
            .deliver_webhook(
                GatewayReference::new("REF1"),
                Outcome::Failed {
                    reason: "Request cancelled by user".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(delivery, WebhookDelivery::Deferred);

        h.ack("wallet/deposit", "REF1");
        let tx = h
            .app
            .orchestrator()
            .start(StartRequest::deposit(1_000, PHONE))
            .await
            .unwrap();
        h.wait_for_state(tx.id, TransactionState::Failed).await;
        assert_eq!(
            h.app.orchestrator().get(tx.id).unwrap().failure_reason.as_deref(),
            Some("Request cancelled by user")
        );
        assert!(!h.app.watcher().is_watching(tx.id));
    }
}
