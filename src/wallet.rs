use crate::{
    Error,
    Result,
    ledger::{
        LedgerClient,
        SubscriptionId,
    },
    types::{
        Account,
        Amount,
    },
};
use std::fmt;
use tracing::{
    debug,
    info,
};

/// Opaque signing capability handed out by the wallet for one account.
pub trait Signer: Clone + Send + Sync + 'static {
    fn address(&self) -> Account;
}

/// External wallet, e.g. a browser extension or a keystore-backed signer.
pub trait WalletProvider: Clone + Send + Sync + 'static {
    type Signer: Signer;

    /// Prompts the user for account access.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send;

    /// Accounts already authorised for this client, without prompting.
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send;

    fn balance(&self, account: &Account) -> impl Future<Output = Result<Amount>> + Send;

    fn signer(&self, account: &Account) -> Result<Self::Signer>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Whether a connect attempt may prompt the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectMode {
    Prompt,
    Silent,
}

/// Asks the wallet for an account to bind.
///
/// A silent attempt with nothing authorised yields `Ok(None)`. A prompt the
/// user answers with an empty list counts as a rejection.
pub async fn request_access<W: WalletProvider>(
    wallet: &W,
    mode: ConnectMode,
) -> Result<Option<Account>> {
    let accounts = match mode {
        ConnectMode::Prompt => wallet.request_accounts().await?,
        ConnectMode::Silent => wallet.list_accounts().await?,
    };
    match (accounts.first(), mode) {
        (Some(account), _) => Ok(Some(*account)),
        (None, ConnectMode::Prompt) => Err(Error::UserRejected),
        (None, ConnectMode::Silent) => Ok(None),
    }
}

/// Everything that only exists while connected.
pub struct Connection<S, C> {
    pub account: Account,
    pub signer: S,
    pub contract: C,
    pub epoch: u64,
    subscriptions: Vec<SubscriptionId>,
}

impl<S, C: LedgerClient> Connection<S, C> {
    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }

    fn teardown(self) {
        for id in self.subscriptions {
            self.contract.unsubscribe(id);
        }
        debug!(epoch = self.epoch, "connection torn down");
    }
}

enum Phase<S, C> {
    Disconnected,
    Connecting { attempt: u64, mode: ConnectMode },
    Connected(Connection<S, C>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rebind {
    Unchanged,
    Switched { previous: Account },
}

/// Connection lifecycle: Disconnected -> Connecting -> Connected.
///
/// Account, signer and contract binding live inside the `Connected` phase,
/// so they exist exactly when the session is connected.
pub struct WalletSession<S, C> {
    phase: Phase<S, C>,
    next_attempt: u64,
    next_epoch: u64,
}

impl<S: Signer, C: LedgerClient> Default for WalletSession<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signer, C: LedgerClient> WalletSession<S, C> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            next_attempt: 0,
            next_epoch: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
        }
    }

    pub fn connection(&self) -> Option<&Connection<S, C>> {
        match &self.phase {
            Phase::Connected(connection) => Some(connection),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.connection().map(|c| &c.account)
    }

    pub fn epoch(&self) -> Option<u64> {
        self.connection().map(|c| c.epoch)
    }

    /// Enters `Connecting` and returns the attempt id its completion must
    /// present. Returns `None` when already connected or connecting.
    pub fn begin_connect(&mut self, mode: ConnectMode) -> Option<u64> {
        if !matches!(self.phase, Phase::Disconnected) {
            return None;
        }
        self.next_attempt += 1;
        let attempt = self.next_attempt;
        self.phase = Phase::Connecting { attempt, mode };
        debug!(attempt, ?mode, "connecting");
        Some(attempt)
    }

    /// Mode of `attempt` if it is still the one in progress.
    pub fn pending_attempt(&self, attempt: u64) -> Option<ConnectMode> {
        match self.phase {
            Phase::Connecting {
                attempt: current,
                mode,
            } if current == attempt => Some(mode),
            _ => None,
        }
    }

    pub fn fail_connect(&mut self, attempt: u64) -> bool {
        if self.pending_attempt(attempt).is_none() {
            return false;
        }
        self.phase = Phase::Disconnected;
        true
    }

    /// Finishes `attempt` and returns the new connection epoch.
    pub fn complete_connect(
        &mut self,
        attempt: u64,
        account: Account,
        signer: S,
        contract: C,
    ) -> Option<u64> {
        self.pending_attempt(attempt)?;
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        info!(%account, epoch, "wallet connected");
        self.phase = Phase::Connected(Connection {
            account,
            signer,
            contract,
            epoch,
            subscriptions: Vec::new(),
        });
        Some(epoch)
    }

    pub fn record_subscription(&mut self, id: SubscriptionId) {
        if let Phase::Connected(connection) = &mut self.phase {
            connection.subscriptions.push(id);
        }
    }

    /// Replaces the active account while staying connected.
    pub fn rebind(&mut self, account: Account, signer: S) -> Option<Rebind> {
        let Phase::Connected(connection) = &mut self.phase else {
            return None;
        };
        let previous = connection.account;
        connection.signer = signer;
        if previous == account {
            return Some(Rebind::Unchanged);
        }
        connection.account = account;
        info!(%previous, %account, "active account changed");
        Some(Rebind::Switched { previous })
    }

    /// Drops back to `Disconnected`, unsubscribing everything the connection
    /// held. Safe to call in any state.
    pub fn disconnect(&mut self) -> ConnectionState {
        let before = self.state();
        match std::mem::replace(&mut self.phase, Phase::Disconnected) {
            Phase::Connected(connection) => {
                info!(account = %connection.account, "wallet disconnected");
                connection.teardown();
            }
            Phase::Connecting { attempt, .. } => debug!(attempt, "connect abandoned"),
            Phase::Disconnected => {}
        }
        before
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        ledger::LedgerConnector,
        memory::{
            InMemoryContract,
            InMemoryLedger,
            MemorySigner,
        },
        types::Address,
    };

    type Session = WalletSession<MemorySigner, InMemoryContract>;

    fn binding() -> (InMemoryLedger, InMemoryContract) {
        let contract = Address::new([0xc0; 20]);
        let ledger = InMemoryLedger::new(contract);
        let client = ledger.bind(contract).unwrap();
        (ledger, client)
    }

    #[test]
    fn complete_connect__requires_the_current_attempt() {
        // given
        let (_ledger, client) = binding();
        let account = Address::new([1; 20]);
        let mut session = Session::new();
        let stale = session.begin_connect(ConnectMode::Prompt).unwrap();
        session.disconnect();
        let current = session.begin_connect(ConnectMode::Silent).unwrap();

        // when
        let stale_epoch =
            session.complete_connect(stale, account, MemorySigner::new(account), client.clone());
        let epoch =
            session.complete_connect(current, account, MemorySigner::new(account), client);

        // then
        assert_eq!(stale_epoch, None);
        assert_eq!(epoch, Some(1));
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.account(), Some(&account));
    }

    #[test]
    fn begin_connect__is_refused_while_connecting() {
        let mut session = Session::new();
        assert!(session.begin_connect(ConnectMode::Prompt).is_some());
        assert_eq!(session.begin_connect(ConnectMode::Prompt), None);
        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn disconnect__unsubscribes_and_is_idempotent() {
        // given
        let (ledger, client) = binding();
        let account = Address::new([1; 20]);
        let mut session = Session::new();
        let attempt = session.begin_connect(ConnectMode::Prompt).unwrap();
        session.complete_connect(attempt, account, MemorySigner::new(account), client.clone());
        let listener = crate::ledger::PushListener::new(|_| true);
        let id = client
            .subscribe(crate::ledger::EventKind::BetResolved, listener)
            .unwrap();
        session.record_subscription(id);
        assert_eq!(ledger.listener_count(), 1);

        // when
        let first = session.disconnect();
        let second = session.disconnect();

        // then
        assert_eq!(first, ConnectionState::Connected);
        assert_eq!(second, ConnectionState::Disconnected);
        assert_eq!(ledger.listener_count(), 0);
        assert!(session.account().is_none());
    }

    #[test]
    fn rebind__reports_whether_the_account_changed() {
        // given
        let (_ledger, client) = binding();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        let mut session = Session::new();
        let attempt = session.begin_connect(ConnectMode::Prompt).unwrap();
        session.complete_connect(attempt, alice, MemorySigner::new(alice), client);

        // when
        let same = session.rebind(alice, MemorySigner::new(alice));
        let switched = session.rebind(bob, MemorySigner::new(bob));

        // then
        assert_eq!(same, Some(Rebind::Unchanged));
        assert_eq!(switched, Some(Rebind::Switched { previous: alice }));
        assert_eq!(session.account(), Some(&bob));
        assert_eq!(session.epoch(), Some(1));
    }
}
