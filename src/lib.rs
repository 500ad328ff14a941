//! Wallet Sync
//!
//! Keeps a wallet session and the wallet's balance of one token in step.
//!
//! This library provides functionality for:
//! - Connecting to a wallet provider, silently on startup or on request
//! - Following account switches and disconnects pushed by the provider
//! - Querying token balances over Solana JSON-RPC, on change and on a timer
//! - Discarding balance results that arrive for a superseded query
//! - Publishing read-only snapshots of the session for presentation code

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod rpc;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "wallet-sync");
    }
}
