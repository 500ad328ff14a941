//! Session engine
//!
//! One task owns the session, the synchronizer and the writing side of the
//! store. It multiplexes user commands, provider events, connect outcomes,
//! balance outcomes and the poll timer with `tokio::select!`, so every state
//! write is sequenced without locks. Spawned connect attempts and balance
//! queries only compute a result; the engine decides whether it still
//! applies.

use super::SyncSettings;
use super::state::{Effect, Session, SessionEvent};
use super::store::{SessionSnapshot, Store, StoreReader};
use super::sync::{BalanceSynchronizer, QueryTicket, SyncDecision};
use crate::models::{TokenAmount, WalletAddress};
use crate::provider::{ProviderAdapter, ProviderError, ProviderEvent, Subscription};
use crate::rpc::BalanceSource;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode {
    Silent,
    Interactive,
}

type ConnectResult = std::result::Result<WalletAddress, ProviderError>;

/// Outward interface of a running engine
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    store: StoreReader,
}

impl SessionHandle {
    /// Ask for an interactive wallet connection
    pub fn request_connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    /// Ask to end the wallet session
    pub fn request_disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::EngineStopped)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> StoreReader {
        self.store.clone()
    }
}

/// Start an engine on the current tokio runtime.
///
/// The engine runs until every `SessionHandle` clone has been dropped; it
/// then releases the provider subscription and abandons outstanding work.
pub fn spawn(
    settings: SyncSettings,
    adapter: ProviderAdapter,
    source: Arc<dyn BalanceSource>,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let engine = SessionEngine::new(settings, adapter, source);
    let handle = SessionHandle {
        commands: commands_tx,
        store: engine.store.reader(),
    };
    let task = tokio::spawn(engine.run(commands_rx));
    (handle, task)
}

struct SessionEngine {
    settings: SyncSettings,
    adapter: ProviderAdapter,
    source: Arc<dyn BalanceSource>,
    session: Session,
    sync: BalanceSynchronizer,
    store: Store,
    connects: JoinSet<ConnectResult>,
    pending_connect: Option<(Id, ConnectMode)>,
    queries: JoinSet<Result<TokenAmount>>,
    tickets: HashMap<Id, QueryTicket>,
    poller: Option<Interval>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    _subscription: Option<Subscription>,
}

impl SessionEngine {
    fn new(settings: SyncSettings, adapter: ProviderAdapter, source: Arc<dyn BalanceSource>) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let subscription = adapter.subscribe(move |event| {
            // The engine is gone once this fails; nothing left to notify.
            let _ = events_tx.send(event);
        });

        Self {
            settings,
            adapter,
            source,
            session: Session::default(),
            sync: BalanceSynchronizer::new(),
            store: Store::new(),
            connects: JoinSet::new(),
            pending_connect: None,
            queries: JoinSet::new(),
            tickets: HashMap::new(),
            poller: None,
            events,
            _subscription: subscription,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let detected = self.adapter.detect();
        tracing::info!(detected, "Wallet provider detection");
        self.dispatch(SessionEvent::ProviderDetected(detected));

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => self.dispatch(SessionEvent::ConnectRequested),
                    Some(Command::Disconnect) => self.dispatch(SessionEvent::DisconnectRequested),
                    None => break,
                },
                Some(event) = self.events.recv() => {
                    tracing::debug!(?event, "Provider event");
                    self.dispatch(event.into());
                }
                Some(joined) = self.connects.join_next_with_id() => self.on_connect_finished(joined),
                Some(joined) = self.queries.join_next_with_id() => self.on_query_finished(joined),
                _ = next_tick(&mut self.poller) => self.on_poll(),
            }
        }

        tracing::info!("Session engine stopped");
    }

    /// Run `event` through the transition table and execute its effects
    fn dispatch(&mut self, event: SessionEvent) {
        let Some(transition) = self.session.apply(&event) else {
            tracing::debug!(state = %self.session.status(), ?event, "Event ignored");
            return;
        };

        let from = self.session.status();
        self.session = transition.next;
        tracing::info!(
            from = %from,
            to = %self.session.status(),
            address = ?self.session.address().map(WalletAddress::short),
            "Session transition"
        );

        for effect in transition.effects {
            self.execute(effect);
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::BeginSilentConnect => self.start_connect(ConnectMode::Silent),
            Effect::BeginInteractiveConnect => self.start_connect(ConnectMode::Interactive),
            Effect::ReleaseProvider => {
                let adapter = self.adapter.clone();
                tokio::spawn(async move { adapter.disconnect().await });
            }
            Effect::SyncBalance(address) => {
                let ticket = self.sync.retarget(&address);
                self.start_query(ticket);
            }
            Effect::ClearBalance => self.sync.reset(),
            Effect::StartPolling => {
                let period = self.settings.poll_interval;
                let start = Instant::now()
                    .checked_add(period)
                    .filter(|_| !period.is_zero());
                let Some(start) = start else {
                    tracing::warn!(?period, "Poll interval out of range, polling disabled");
                    self.poller = None;
                    return;
                };
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poller = Some(interval);
            }
            Effect::StopPolling => self.poller = None,
        }
    }

    fn start_connect(&mut self, mode: ConnectMode) {
        let adapter = self.adapter.clone();
        let handle = self.connects.spawn(async move {
            match mode {
                ConnectMode::Silent => adapter.connect_silently().await,
                ConnectMode::Interactive => adapter.connect_interactive().await,
            }
        });
        // A newer attempt supersedes any older one still running.
        self.pending_connect = Some((handle.id(), mode));
    }

    fn on_connect_finished(&mut self, joined: std::result::Result<(Id, ConnectResult), JoinError>) {
        let (id, result) = match joined {
            Ok(done) => done,
            Err(e) => (
                e.id(),
                Err(ProviderError::Internal(format!("connect task failed: {}", e))),
            ),
        };

        let mode = match self.pending_connect {
            Some((pending, mode)) if pending == id => mode,
            _ => {
                tracing::debug!("Discarding outcome of superseded connect attempt");
                return;
            }
        };
        self.pending_connect = None;

        let event = match (mode, result) {
            (ConnectMode::Silent, Ok(address)) => SessionEvent::SilentConnectSucceeded(address),
            (ConnectMode::Silent, Err(e)) => {
                tracing::debug!("Silent connect failed: {}", e);
                SessionEvent::SilentConnectFailed
            }
            (ConnectMode::Interactive, Ok(address)) => SessionEvent::ConnectSucceeded(address),
            (ConnectMode::Interactive, Err(e)) => {
                tracing::warn!("Wallet connection failed: {}", e);
                SessionEvent::ConnectFailed(e)
            }
        };
        self.dispatch(event);
    }

    fn start_query(&mut self, ticket: QueryTicket) {
        let source = Arc::clone(&self.source);
        let mint = self.settings.mint.clone();
        let limit = self.settings.query_timeout;
        let owner = ticket.address.clone();
        tracing::debug!(address = %owner, seq = ticket.seq, "Querying balance");

        let handle = self.queries.spawn(async move {
            match tokio::time::timeout(limit, source.token_balance(&owner, &mint)).await {
                Ok(result) => result,
                Err(_) => Err(Error::balance_query(format!("timed out after {:?}", limit))),
            }
        });
        self.tickets.insert(handle.id(), ticket);
    }

    fn on_query_finished(&mut self, joined: std::result::Result<(Id, Result<TokenAmount>), JoinError>) {
        let (id, result) = match joined {
            Ok(done) => done,
            Err(e) => (
                e.id(),
                Err(Error::balance_query(format!("query task failed: {}", e))),
            ),
        };
        let Some(ticket) = self.tickets.remove(&id) else {
            return;
        };

        if let Err(e) = &result {
            tracing::warn!(address = %ticket.address, seq = ticket.seq, "Balance query failed: {}", e);
        }

        match self.sync.complete(self.session.address(), &ticket, result) {
            SyncDecision::Applied => {
                tracing::debug!(address = %ticket.address, seq = ticket.seq, "Balance reading applied");
                self.publish();
            }
            SyncDecision::Superseded => {
                tracing::debug!(seq = ticket.seq, "Discarding superseded balance result");
            }
            SyncDecision::StaleAddress => {
                tracing::debug!(address = %ticket.address, seq = ticket.seq, "Discarding balance result for previous address");
            }
        }
    }

    fn on_poll(&mut self) {
        let Some(address) = self.session.address().cloned() else {
            return;
        };
        match self.sync.poll(&address) {
            Some(ticket) => self.start_query(ticket),
            None => tracing::debug!(address = %address, "Poll skipped, query already in flight"),
        }
    }

    fn publish(&self) {
        self.store
            .publish(SessionSnapshot::from_parts(&self.session, self.sync.reading()));
    }
}

async fn next_tick(poller: &mut Option<Interval>) {
    match poller {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
