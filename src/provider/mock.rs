//! Scriptable wallet provider for tests

use super::{EVENT_CAPACITY, ProviderError, ProviderEvent, WalletProvider};
use crate::models::WalletAddress;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Outcome of an interactive connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Approve(WalletAddress),
    Fail(ProviderError),
}

/// Provider whose answers and events are set by the test
#[derive(Debug)]
pub struct MockProvider {
    trusted: Mutex<Option<WalletAddress>>,
    interactive: Mutex<ConnectBehavior>,
    interactive_delay: Mutex<Duration>,
    silent_delay: Mutex<Duration>,
    fail_disconnect: AtomicBool,
    current: Mutex<Option<WalletAddress>>,
    events: broadcast::Sender<ProviderEvent>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Untrusted provider that rejects interactive requests
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            trusted: Mutex::new(None),
            interactive: Mutex::new(ConnectBehavior::Fail(ProviderError::UserRejected)),
            interactive_delay: Mutex::new(Duration::ZERO),
            silent_delay: Mutex::new(Duration::ZERO),
            fail_disconnect: AtomicBool::new(false),
            current: Mutex::new(None),
            events,
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    /// Address returned by silent connects; `None` makes them fail
    pub fn set_trusted(&self, address: Option<WalletAddress>) {
        *self.trusted.lock().unwrap_or_else(|e| e.into_inner()) = address;
    }

    pub fn set_interactive(&self, behavior: ConnectBehavior) {
        *self.interactive.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    /// Time the interactive prompt stays open before resolving
    pub fn set_interactive_delay(&self, delay: Duration) {
        *self.interactive_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Time a silent connect takes before resolving
    pub fn set_silent_delay(&self, delay: Duration) {
        *self.silent_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Emit an event to every subscriber and track the implied account
    pub fn emit(&self, event: ProviderEvent) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            match &event {
                ProviderEvent::Connect(address) => *current = Some(address.clone()),
                ProviderEvent::Disconnect => *current = None,
                ProviderEvent::AccountChanged(address) => *current = address.clone(),
            }
        }
        // No subscribers is not an error for a mock.
        let _ = self.events.send(event);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn connect(&self, only_if_trusted: bool) -> Result<WalletAddress, ProviderError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        // The outcome is fixed when the request is made, as a real prompt would be.
        let (outcome, delay) = if only_if_trusted {
            let outcome = self
                .trusted
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .ok_or(ProviderError::NotAuthorized);
            (outcome, *self.silent_delay.lock().unwrap_or_else(|e| e.into_inner()))
        } else {
            let outcome = match self.interactive.lock().unwrap_or_else(|e| e.into_inner()).clone() {
                ConnectBehavior::Approve(address) => Ok(address),
                ConnectBehavior::Fail(e) => Err(e),
            };
            (outcome, *self.interactive_delay.lock().unwrap_or_else(|e| e.into_inner()))
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Ok(address) = &outcome {
            *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(address.clone());
        }
        outcome
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;

        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ProviderError::Internal("disconnect failed".to_string()));
        }
        Ok(())
    }

    fn public_key(&self) -> Option<WalletAddress> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
