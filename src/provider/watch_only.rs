//! Watch-only wallet provider
//!
//! Follows a single public key without holding any secret. The key counts as
//! pre-authorized when `trusted` is set, so the silent connect on startup
//! succeeds; otherwise the first connection must be requested explicitly.

use super::{EVENT_CAPACITY, ProviderError, ProviderEvent, WalletProvider};
use crate::models::WalletAddress;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug)]
struct Inner {
    address: WalletAddress,
    connected: bool,
    trusted: bool,
}

/// Provider bound to one configured address
#[derive(Debug)]
pub struct WatchOnlyProvider {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ProviderEvent>,
}

impl WatchOnlyProvider {
    pub fn new(address: WalletAddress, trusted: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                address,
                connected: false,
                trusted,
            }),
            events,
        }
    }

    /// Follow another key; connected subscribers see `AccountChanged`
    #[cfg(test)]
    pub(crate) fn switch_account(&self, address: WalletAddress) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.address == address {
            return;
        }
        inner.address = address.clone();
        if inner.connected {
            let _ = self.events.send(ProviderEvent::AccountChanged(Some(address)));
        }
    }

    /// Drop the connection from the wallet side
    #[cfg(test)]
    pub(crate) fn emit_disconnect(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.connected {
            inner.connected = false;
            let _ = self.events.send(ProviderEvent::Disconnect);
        }
    }
}

#[async_trait]
impl WalletProvider for WatchOnlyProvider {
    async fn connect(&self, only_if_trusted: bool) -> Result<WalletAddress, ProviderError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if only_if_trusted && !inner.trusted {
            return Err(ProviderError::NotAuthorized);
        }
        inner.connected = true;
        // An explicit approval makes later silent reconnects succeed.
        inner.trusted = true;
        Ok(inner.address.clone())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).connected = false;
        Ok(())
    }

    fn public_key(&self) -> Option<WalletAddress> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.connected.then(|| inner.address.clone())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
