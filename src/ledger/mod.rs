//! Notification / Ledger Sink
//!
//! Receives lifecycle events and maintains the user-visible activity log.
//! One activity entry per transaction: created as "processing" and updated in
//! place when the transaction resolves.

pub mod activity;
pub mod events;

pub use activity::{ActivityEntry, ActivityLedger, EntryStatus};
pub use events::{EventSink, LifecycleEvent};
