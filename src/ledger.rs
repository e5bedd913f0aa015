//! Read/write gateway to the wager contract.
//!
//! A [`LedgerConnector`] produces a [`LedgerClient`] bound to one contract
//! address on the network the wallet is currently attached to. Bindings are
//! network specific and must be dropped when the network changes.

use crate::{
    Error,
    Result,
    types::{
        Account,
        Address,
        Amount,
        Bet,
        BetId,
        GameKind,
        GameStats,
        Stat,
        WagerRequest,
    },
    wallet::Signer,
};
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::oneshot;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    BetPlaced,
    BetResolved,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::BetPlaced, EventKind::BetResolved];
}

/// Push notifications emitted by the contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    BetPlaced {
        id: BetId,
        player: Account,
        amount: Amount,
        game: GameKind,
        prediction: u8,
    },
    BetResolved {
        id: BetId,
        player: Account,
        result: u8,
        won: bool,
        payout: Amount,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::BetPlaced { .. } => EventKind::BetPlaced,
            LedgerEvent::BetResolved { .. } => EventKind::BetResolved,
        }
    }

    pub fn player(&self) -> &Account {
        match self {
            LedgerEvent::BetPlaced { player, .. }
            | LedgerEvent::BetResolved { player, .. } => player,
        }
    }

    pub fn bet_id(&self) -> BetId {
        match self {
            LedgerEvent::BetPlaced { id, .. } | LedgerEvent::BetResolved { id, .. } => *id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback registered with [`LedgerClient::subscribe`].
#[derive(Clone)]
pub struct PushListener {
    deliver: Arc<dyn Fn(LedgerEvent) -> bool + Send + Sync>,
}

impl PushListener {
    pub fn new(deliver: impl Fn(LedgerEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Returns `false` once nobody is listening any more.
    pub fn deliver(&self, event: LedgerEvent) -> bool {
        (self.deliver)(event)
    }
}

impl fmt::Debug for PushListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushListener").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub bet_id: Option<BetId>,
}

/// A submitted transaction whose confirmation has not been observed yet.
#[derive(Debug)]
pub struct TxHandle {
    tx_hash: String,
    outcome: oneshot::Receiver<Result<TxReceipt>>,
}

impl TxHandle {
    /// Creates a handle together with the sender that settles it.
    pub fn new(tx_hash: impl Into<String>) -> (Self, oneshot::Sender<Result<TxReceipt>>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            tx_hash: tx_hash.into(),
            outcome: rx,
        };
        (handle, tx)
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub async fn confirmation(self) -> Result<TxReceipt> {
        let tx_hash = self.tx_hash;
        self.outcome.await.map_err(|_| {
            Error::rpc(format!("lost track of transaction {tx_hash} before confirmation"))
        })?
    }
}

pub trait LedgerClient: Clone + Send + Sync + 'static {
    fn read_total_bets(&self) -> impl Future<Output = Result<u64>> + Send;

    fn read_total_payout(&self) -> impl Future<Output = Result<Amount>> + Send;

    fn read_contract_balance(&self) -> impl Future<Output = Result<Amount>> + Send;

    /// Reads every stat field; fields fail independently.
    ///
    /// Only when no field could be read at all is the whole call an error.
    fn read_stats(&self) -> impl Future<Output = Result<GameStats>> + Send {
        async move {
            let (total_bets, total_payout, contract_balance) = futures::join!(
                self.read_total_bets(),
                self.read_total_payout(),
                self.read_contract_balance(),
            );
            collect_stats(total_bets, total_payout, contract_balance)
        }
    }

    /// Ids of every bet placed by `player`, in no particular order.
    fn read_player_bet_ids(
        &self,
        player: &Account,
    ) -> impl Future<Output = Result<Vec<BetId>>> + Send;

    fn read_bet(&self, id: BetId) -> impl Future<Output = Result<Bet>> + Send;

    /// Fails without a handle when the wager cannot even be submitted.
    fn submit_wager<S: Signer>(
        &self,
        request: &WagerRequest,
        signer: &S,
    ) -> impl Future<Output = Result<TxHandle>> + Send;

    fn subscribe(&self, kind: EventKind, listener: PushListener) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId);
}

pub trait LedgerConnector {
    type Client: LedgerClient;

    /// Binds a client to `contract` on the wallet's current network.
    fn bind(&self, contract: Address) -> Result<Self::Client>;
}

fn collect_stats(
    total_bets: Result<u64>,
    total_payout: Result<Amount>,
    contract_balance: Result<Amount>,
) -> Result<GameStats> {
    let first_error = [
        total_bets.as_ref().err(),
        total_payout.as_ref().err(),
        contract_balance.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    .next()
    .cloned();
    if let Some(err) = &first_error {
        warn!(%err, "stat read failed");
    }
    let stats = GameStats {
        total_bets: Stat::from(total_bets),
        total_payout: Stat::from(total_payout),
        contract_balance: Stat::from(contract_balance),
    };
    match first_error {
        Some(err) if stats == GameStats::unavailable() => Err(err),
        _ => Ok(stats),
    }
}
