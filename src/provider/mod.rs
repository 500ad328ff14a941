//! Provider module - Wallet provider detection and capability adapter
//!
//! A wallet provider is the externally injected object that owns the user's
//! keys. The rest of the crate never talks to it directly; it goes through
//! `ProviderAdapter`, which normalizes its failures into `ProviderError` and
//! turns its event stream into a scoped `Subscription`.
//!
//! Implementations:
//! - `WatchOnlyProvider`: follows one configured public key
//! - `MockProvider`: scriptable provider for tests

use crate::models::WalletAddress;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub mod mock;
pub mod watch_only;

pub use mock::{ConnectBehavior, MockProvider};
pub use watch_only::WatchOnlyProvider;

/// Buffer size of provider event channels. A subscriber that falls further
/// behind loses the oldest events and is resynchronized from `public_key()`.
pub const EVENT_CAPACITY: usize = 64;

/// Failures surfaced by a wallet provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No compatible provider is injected
    #[error("provider unavailable")]
    ProviderUnavailable,

    /// Silent reconnection was not pre-authorized
    #[error("not authorized")]
    NotAuthorized,

    /// The user declined the connection prompt
    #[error("request rejected")]
    UserRejected,

    /// Anything else the provider reported
    #[error("{0}")]
    Internal(String),
}

/// Lifecycle and account events emitted by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect(WalletAddress),
    Disconnect,
    AccountChanged(Option<WalletAddress>),
}

/// Capability surface of an injected wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connect, optionally without prompting (`only_if_trusted`)
    async fn connect(&self, only_if_trusted: bool) -> Result<WalletAddress, ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Currently connected public key
    fn public_key(&self) -> Option<WalletAddress>;

    /// A fresh receiver for lifecycle events
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Isolates the session from the presence and exact shape of the provider
#[derive(Clone, Default)]
pub struct ProviderAdapter {
    injected: Option<Arc<dyn WalletProvider>>,
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("detected", &self.detect())
            .finish()
    }
}

impl ProviderAdapter {
    pub fn new(injected: Option<Arc<dyn WalletProvider>>) -> Self {
        Self { injected }
    }

    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        Self::new(Some(provider))
    }

    /// Adapter for an environment without any wallet
    pub fn absent() -> Self {
        Self::new(None)
    }

    /// Whether a compatible provider is present
    pub fn detect(&self) -> bool {
        self.injected.is_some()
    }

    /// Resume a previously authorized session without prompting
    pub async fn connect_silently(&self) -> Result<WalletAddress, ProviderError> {
        let provider = self
            .injected
            .as_ref()
            .ok_or(ProviderError::ProviderUnavailable)?;

        provider.connect(true).await.map_err(|e| {
            tracing::debug!("Silent connect declined: {}", e);
            match e {
                ProviderError::ProviderUnavailable => ProviderError::ProviderUnavailable,
                _ => ProviderError::NotAuthorized,
            }
        })
    }

    /// Prompt the user for a connection
    pub async fn connect_interactive(&self) -> Result<WalletAddress, ProviderError> {
        let provider = self
            .injected
            .as_ref()
            .ok_or(ProviderError::ProviderUnavailable)?;

        provider.connect(false).await.map_err(|e| match e {
            ProviderError::UserRejected | ProviderError::NotAuthorized => {
                ProviderError::UserRejected
            }
            ProviderError::ProviderUnavailable => ProviderError::ProviderUnavailable,
            ProviderError::Internal(msg) => {
                tracing::warn!("Provider failed during connect: {}", msg);
                ProviderError::ProviderUnavailable
            }
        })
    }

    /// Release the provider session; failures are logged, never returned
    pub async fn disconnect(&self) {
        let Some(provider) = &self.injected else {
            return;
        };
        if let Err(e) = provider.disconnect().await {
            tracing::warn!("Provider disconnect failed, continuing: {}", e);
        }
    }

    pub fn public_key(&self) -> Option<WalletAddress> {
        self.injected.as_ref().and_then(|p| p.public_key())
    }

    /// Register `handler` for provider events.
    ///
    /// Returns `None` when no provider is present. Events are delivered in
    /// emission order until the returned `Subscription` is dropped or
    /// released. If more than `EVENT_CAPACITY` events pile up unread, the
    /// handler first receives an event describing the provider's current
    /// account, then the retained events. Must be called inside a tokio
    /// runtime.
    pub fn subscribe<F>(&self, handler: F) -> Option<Subscription>
    where
        F: Fn(ProviderEvent) + Send + 'static,
    {
        let injected = self.injected.as_ref()?;
        let mut events = injected.events();
        // Weak so the subscription does not keep the provider's event stream open.
        let provider = Arc::downgrade(injected);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Dropped {} provider events, resyncing from current account", skipped);
                        let current = provider.upgrade().and_then(|p| p.public_key());
                        handler(match current {
                            Some(address) => ProviderEvent::Connect(address),
                            None => ProviderEvent::Disconnect,
                        });
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Provider event stream closed");
                        break;
                    }
                }
            }
        });

        Some(Subscription { task })
    }
}

/// Handle to a provider event registration; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop receiving events
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
