//! Confirmation Watcher
//!
//! Observes acknowledged transactions until they reach a terminal state.
//! The orchestrator hands work over through [`watch_channel`].

pub mod channel;
pub mod confirmation;


pub use channel::{WatchReceiver, WatchRequest, WatchSender, watch_channel};
pub use confirmation::{ConfirmationWatcher, WatchExit, WatcherConfig, WebhookDelivery, outcome_for};
