//! Session state machine
//!
//! `Session::apply` is a pure transition function: it never performs I/O, it
//! only returns the next state and the effects the engine has to run. Events
//! that have no meaning in the current state yield `None` and leave the
//! session untouched.

use crate::models::WalletAddress;
use crate::provider::{ProviderError, ProviderEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MSG_PROVIDER_NOT_FOUND: &str = "provider not found";
pub const MSG_REQUEST_REJECTED: &str = "request rejected";
pub const MSG_PROVIDER_UNAVAILABLE: &str = "provider unavailable";

/// Connection status as seen by readers of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Unavailable,
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Unavailable => "unavailable",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The application's view of the wallet connection.
///
/// Only `Connected` carries an address, so "address present iff connected"
/// holds for every value of this type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Uninitialized,
    Unavailable {
        message: String,
    },
    Disconnected,
    Connecting,
    Connected {
        address: WalletAddress,
    },
    Error {
        message: String,
    },
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Result of the startup capability check
    ProviderDetected(bool),
    SilentConnectSucceeded(WalletAddress),
    SilentConnectFailed,
    /// The user asked for an interactive connection
    ConnectRequested,
    ConnectSucceeded(WalletAddress),
    ConnectFailed(ProviderError),
    /// Provider emitted `connect`
    ProviderConnected(WalletAddress),
    /// Provider emitted `disconnect`
    ProviderDisconnected,
    /// Provider emitted `accountChanged`
    AccountChanged(Option<WalletAddress>),
    /// The user asked to disconnect
    DisconnectRequested,
}

impl From<ProviderEvent> for SessionEvent {
    fn from(event: ProviderEvent) -> Self {
        match event {
            ProviderEvent::Connect(address) => SessionEvent::ProviderConnected(address),
            ProviderEvent::Disconnect => SessionEvent::ProviderDisconnected,
            ProviderEvent::AccountChanged(address) => SessionEvent::AccountChanged(address),
        }
    }
}

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    BeginSilentConnect,
    BeginInteractiveConnect,
    /// Best-effort provider disconnect
    ReleaseProvider,
    /// `address` became current: drop the old reading and query afresh
    SyncBalance(WalletAddress),
    ClearBalance,
    StartPolling,
    StopPolling,
}

/// Next state plus the effects to run, applied as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: Session, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn connected(address: WalletAddress) -> Self {
        Self::to(
            Session::Connected {
                address: address.clone(),
            },
            vec![Effect::StartPolling, Effect::SyncBalance(address)],
        )
    }

    fn account_switch(address: WalletAddress) -> Self {
        Self::to(
            Session::Connected {
                address: address.clone(),
            },
            vec![Effect::SyncBalance(address)],
        )
    }

    fn dropped(extra: Option<Effect>) -> Self {
        let mut effects = vec![Effect::StopPolling, Effect::ClearBalance];
        effects.extend(extra);
        Self::to(Session::Disconnected, effects)
    }
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Uninitialized => SessionStatus::Uninitialized,
            Session::Unavailable { .. } => SessionStatus::Unavailable,
            Session::Disconnected => SessionStatus::Disconnected,
            Session::Connecting => SessionStatus::Connecting,
            Session::Connected { .. } => SessionStatus::Connected,
            Session::Error { .. } => SessionStatus::Error,
        }
    }

    pub fn address(&self) -> Option<&WalletAddress> {
        match self {
            Session::Connected { address } => Some(address),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Session::Unavailable { message } | Session::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Compute the transition for `event`, or `None` if the event is ignored
    pub fn apply(&self, event: &SessionEvent) -> Option<Transition> {
        use SessionEvent as E;

        match (self, event) {
            (Session::Uninitialized, E::ProviderDetected(false)) => Some(Transition::to(
                Session::Unavailable {
                    message: MSG_PROVIDER_NOT_FOUND.to_string(),
                },
                vec![],
            )),
            (Session::Uninitialized, E::ProviderDetected(true)) => Some(Transition::to(
                Session::Disconnected,
                vec![Effect::BeginSilentConnect],
            )),

            (Session::Disconnected, E::SilentConnectSucceeded(address)) => {
                Some(Transition::connected(address.clone()))
            }

            (Session::Disconnected | Session::Error { .. }, E::ConnectRequested) => Some(
                Transition::to(Session::Connecting, vec![Effect::BeginInteractiveConnect]),
            ),

            (Session::Connecting, E::ConnectSucceeded(address)) => {
                Some(Transition::connected(address.clone()))
            }
            (Session::Connecting, E::ConnectFailed(error)) => {
                let message = match error {
                    ProviderError::UserRejected | ProviderError::NotAuthorized => {
                        MSG_REQUEST_REJECTED
                    }
                    ProviderError::ProviderUnavailable | ProviderError::Internal(_) => {
                        MSG_PROVIDER_UNAVAILABLE
                    }
                };
                Some(Transition::to(
                    Session::Error {
                        message: message.to_string(),
                    },
                    vec![],
                ))
            }

            // The wallet connected on its own (e.g. approved from the extension UI).
            (
                Session::Disconnected | Session::Connecting | Session::Error { .. },
                E::ProviderConnected(address),
            ) => Some(Transition::connected(address.clone())),

            (Session::Connected { address: current }, E::ProviderConnected(address))
            | (Session::Connected { address: current }, E::AccountChanged(Some(address))) => {
                if current == address {
                    None
                } else {
                    Some(Transition::account_switch(address.clone()))
                }
            }

            (Session::Connected { .. }, E::ProviderDisconnected)
            | (Session::Connected { .. }, E::AccountChanged(None)) => {
                Some(Transition::dropped(None))
            }
            (Session::Connected { .. }, E::DisconnectRequested) => {
                Some(Transition::dropped(Some(Effect::ReleaseProvider)))
            }

            _ => None,
        }
    }
}
