//! Observable store
//!
//! Presentation code reads `SessionSnapshot`s from a `StoreReader`; only the
//! session engine owns the writing side.

use super::state::{Session, SessionStatus};
use super::sync::BalanceReading;
use crate::models::{TokenAmount, WalletAddress};
use serde::Serialize;
use tokio::sync::watch;

/// Read-only view of the session and its balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub address: Option<WalletAddress>,
    pub error_message: Option<String>,
    /// `None` while connected means "balance unknown", never zero
    pub amount: Option<TokenAmount>,
    pub balance_error: Option<String>,
    pub queried_at: Option<u64>,
}

impl SessionSnapshot {
    pub fn from_parts(session: &Session, reading: Option<&BalanceReading>) -> Self {
        let address = session.address().cloned();
        // A reading for any other owner is never exposed.
        let reading = reading.filter(|r| Some(&r.address) == address.as_ref());

        Self {
            status: session.status(),
            address,
            error_message: session.error_message().map(str::to_string),
            amount: reading.and_then(|r| r.amount),
            balance_error: reading.and_then(|r| r.error.clone()),
            queried_at: reading.map(|r| r.queried_at),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Connected but without a usable balance
    pub fn balance_unknown(&self) -> bool {
        self.is_connected() && self.amount.is_none()
    }
}

/// Writing side, held by the engine
#[derive(Debug)]
pub struct Store {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    /// Replace the snapshot; readers are woken only on an actual change
    pub fn publish(&self, snapshot: SessionSnapshot) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        })
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reading side, cheap to clone
#[derive(Debug, Clone)]
pub struct StoreReader {
    rx: watch::Receiver<SessionSnapshot>,
}

impl StoreReader {
    /// Latest snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change; `None` once the engine has stopped
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one first
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        self.rx.wait_for(predicate).await.ok().map(|s| s.clone())
    }
}
