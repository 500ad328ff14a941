//! Balance sources that never touch the network
//!
//! `StaticBalanceSource` answers from a fixed table and backs the `demo`
//! source. `ScriptedBalanceSource` hands every query to the test, which
//! decides when and how it completes, so completion order can be controlled.

use super::BalanceSource;
use crate::models::{TokenAmount, WalletAddress};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Wallet used by the demo provider
pub const DEMO_WALLET: &str = "DemoWa11etXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";

/// Mint tracked in demo mode when none is configured
pub const DEMO_MINT: &str = "DemoMintXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";

/// Fixed balances keyed by owner
#[derive(Debug, Default)]
pub struct StaticBalanceSource {
    balances: Mutex<HashMap<WalletAddress, TokenAmount>>,
    decimals: u8,
}

impl StaticBalanceSource {
    pub fn new(decimals: u8) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            decimals,
        }
    }

    /// A source that knows the demo wallet
    pub fn demo(decimals: u8) -> Self {
        let source = Self::new(decimals);
        if let Ok(address) = DEMO_WALLET.parse() {
            let raw = 1_250u64.saturating_mul(10u64.saturating_pow(decimals as u32));
            source.set_balance(address, TokenAmount::new(raw, decimals));
        }
        source
    }

    pub fn set_balance(&self, owner: WalletAddress, amount: TokenAmount) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(owner, amount);
        }
    }
}

#[async_trait]
impl BalanceSource for StaticBalanceSource {
    async fn token_balance(&self, owner: &WalletAddress, _mint: &str) -> Result<TokenAmount> {
        let balances = self
            .balances
            .lock()
            .map_err(|_| Error::balance_query("balance table poisoned"))?;
        Ok(balances
            .get(owner)
            .copied()
            .unwrap_or_else(|| TokenAmount::zero(self.decimals)))
    }
}

/// A balance query waiting for the test to answer it
#[derive(Debug)]
pub struct PendingQuery {
    pub owner: WalletAddress,
    pub mint: String,
    reply: oneshot::Sender<Result<TokenAmount>>,
}

impl PendingQuery {
    pub fn respond(self, result: Result<TokenAmount>) {
        // The engine may have stopped waiting; that is fine.
        let _ = self.reply.send(result);
    }

    pub fn succeed(self, amount: TokenAmount) {
        self.respond(Ok(amount));
    }

    pub fn fail(self, message: &str) {
        self.respond(Err(Error::rpc(message)));
    }
}

/// Receiving side of a `ScriptedBalanceSource`
#[derive(Debug)]
pub struct QueryInbox {
    rx: mpsc::UnboundedReceiver<PendingQuery>,
}

impl QueryInbox {
    /// Wait for the next query issued against the source
    pub async fn next(&mut self) -> Option<PendingQuery> {
        self.rx.recv().await
    }

    /// Take a query if one has already been issued
    pub fn try_next(&mut self) -> Option<PendingQuery> {
        self.rx.try_recv().ok()
    }
}

/// Balance source whose answers are supplied through a `QueryInbox`
#[derive(Debug)]
pub struct ScriptedBalanceSource {
    tx: mpsc::UnboundedSender<PendingQuery>,
}

impl ScriptedBalanceSource {
    pub fn new() -> (Self, QueryInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, QueryInbox { rx })
    }
}

#[async_trait]
impl BalanceSource for ScriptedBalanceSource {
    async fn token_balance(&self, owner: &WalletAddress, mint: &str) -> Result<TokenAmount> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(PendingQuery {
                owner: owner.clone(),
                mint: mint.to_string(),
                reply,
            })
            .map_err(|_| Error::balance_query("query inbox closed"))?;

        answer
            .await
            .map_err(|_| Error::balance_query("query abandoned"))?
    }
}
