//! Session module - Wallet session lifecycle and balance synchronization
//!
//! The engine owns the session state machine and the balance synchronizer on
//! a single task. Presentation code talks to it through a `SessionHandle`:
//! read-only snapshots plus `request_connect` / `request_disconnect`.

use std::time::Duration;

pub mod engine;
pub mod state;
pub mod store;
pub mod sync;

pub use engine::{SessionHandle, spawn};
pub use state::{Effect, Session, SessionEvent, SessionStatus, Transition};
pub use store::{SessionSnapshot, Store, StoreReader};
pub use sync::{BalanceReading, BalanceSynchronizer, QueryTicket, SyncDecision};

/// Tunables of the balance synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Mint of the tracked token
    pub mint: String,
    /// Refresh period while connected
    pub poll_interval: Duration,
    /// Bound on a single balance query
    pub query_timeout: Duration,
}

impl SyncSettings {
    pub fn new(mint: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            poll_interval: Duration::from_secs(10),
            query_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}
