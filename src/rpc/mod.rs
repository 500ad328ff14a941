//! RPC module - Abstraction for querying on-chain token balances
//!
//! The session engine only needs one logical operation from the chain: the
//! balance an owner holds of a single mint. Implementations:
//! - `SolanaRpcClient`: JSON-RPC over HTTP against a Solana node
//! - `StaticBalanceSource`: fixed balances for the demo mode
//! - `ScriptedBalanceSource`: test double whose answers are supplied by the test

use crate::models::{TokenAmount, WalletAddress};
use crate::{Config, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use std::sync::Arc;

pub mod mock;
pub mod solana;

pub use mock::{DEMO_MINT, DEMO_WALLET, PendingQuery, QueryInbox, ScriptedBalanceSource, StaticBalanceSource};
pub use solana::SolanaRpcClient;

/// Balance source trait for fetching token holdings
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Total holdings of `mint` owned by `owner`.
    ///
    /// An owner without any account for the mint has a zero balance, not an error.
    async fn token_balance(&self, owner: &WalletAddress, mint: &str) -> Result<TokenAmount>;
}

#[async_trait]
impl<T: BalanceSource + ?Sized> BalanceSource for Arc<T> {
    async fn token_balance(&self, owner: &WalletAddress, mint: &str) -> Result<TokenAmount> {
        (**self).token_balance(owner, mint).await
    }
}

/// Backend selection for balances and wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceType {
    /// Solana JSON-RPC endpoint with the configured wallet
    Rpc,
    /// Built-in demo wallet and balances, no network
    Demo,
}

/// Create a balance source based on type and configuration
pub fn create_balance_source(
    source_type: SourceType,
    config: &Config,
) -> Result<Arc<dyn BalanceSource>> {
    match source_type {
        SourceType::Rpc => {
            let client = SolanaRpcClient::new(config.rpc_url(), config.rpc.request_timeout())?
                .with_max_retries(config.rpc.max_retries)
                .with_retry_delay(config.rpc.retry_delay())
                .with_fallback_decimals(config.token.decimals);
            Ok(Arc::new(client))
        }
        SourceType::Demo => Ok(Arc::new(StaticBalanceSource::demo(config.token.decimals))),
    }
}
