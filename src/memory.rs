//! In-process ledger, wallet and config store.
//!
//! They back the integration tests and the demo binary. The ledger does no
//! settlement of its own: whoever drives it decides how bets resolve.

use crate::{
    Error,
    Result,
    config::{
        ClientConfig,
        ConfigStore,
    },
    ledger::{
        EventKind,
        LedgerClient,
        LedgerConnector,
        LedgerEvent,
        PushListener,
        SubscriptionId,
        TxHandle,
        TxReceipt,
    },
    types::{
        Account,
        Address,
        Amount,
        Bet,
        BetId,
        BetStatus,
        WagerRequest,
    },
    wallet::{
        Signer,
        WalletProvider,
    },
};
use chrono::Utc;
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tokio::sync::oneshot;

/// Remote operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    TotalBets,
    TotalPayout,
    ContractBalance,
    PlayerBetIds,
    Bet,
    Submit,
    Subscribe,
}

struct PendingTx {
    request: WagerRequest,
    player: Account,
    tx_hash: String,
    settle: oneshot::Sender<Result<TxReceipt>>,
}

struct LedgerState {
    network: u64,
    contract: Address,
    contract_network: u64,
    contract_balance: Amount,
    balances: HashMap<Account, Amount>,
    bets: BTreeMap<BetId, Bet>,
    next_bet_id: BetId,
    total_bets: u64,
    total_payout: Amount,
    listeners: BTreeMap<SubscriptionId, (EventKind, PushListener)>,
    next_subscription: u64,
    auto_confirm: bool,
    pending: VecDeque<PendingTx>,
    failing: HashSet<LedgerOp>,
    reject_next_submit: Option<Error>,
    calls: usize,
}

#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// A ledger with `contract` deployed on network 1.
    pub fn new(contract: Address) -> Self {
        let state = LedgerState {
            network: 1,
            contract,
            contract_network: 1,
            contract_balance: Amount::ZERO,
            balances: HashMap::new(),
            bets: BTreeMap::new(),
            next_bet_id: 1,
            total_bets: 0,
            total_payout: Amount::ZERO,
            listeners: BTreeMap::new(),
            next_subscription: 0,
            auto_confirm: true,
            pending: VecDeque::new(),
            failing: HashSet::new(),
            reject_next_submit: None,
            calls: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contract(&self) -> Address {
        self.state().contract
    }

    pub fn network(&self) -> u64 {
        self.state().network
    }

    pub fn fund(&self, account: Account, amount: Amount) {
        let mut state = self.state();
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn fund_contract(&self, amount: Amount) {
        let mut state = self.state();
        state.contract_balance = state.contract_balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &Account) -> Amount {
        self.state()
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Moves the wallet to another network. Bindings made before the switch
    /// stop working.
    pub fn switch_network(&self, network: u64) {
        self.state().network = network;
    }

    /// Redeploys the contract onto the current network.
    pub fn redeploy_here(&self) {
        let mut state = self.state();
        state.contract_network = state.network;
    }

    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.state().auto_confirm = auto_confirm;
    }

    pub fn fail(&self, op: LedgerOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: LedgerOp) {
        self.state().failing.remove(&op);
    }

    pub fn reject_next_submit(&self, err: Error) {
        self.state().reject_next_submit = Some(err);
    }

    /// Number of remote calls made through any binding.
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    pub fn bet(&self, id: BetId) -> Option<Bet> {
        self.state().bets.get(&id).cloned()
    }

    pub fn unresolved_bets(&self) -> Vec<Bet> {
        self.state()
            .bets
            .values()
            .filter(|bet| !bet.is_resolved())
            .cloned()
            .collect()
    }

    /// Mines the oldest pending wager, emitting `BetPlaced`.
    pub fn confirm_next(&self) -> Option<BetId> {
        let (receipt, settle, event) = {
            let mut state = self.state();
            let pending = state.pending.pop_front()?;
            let (receipt, event) = state.accept(pending.request, pending.player, pending.tx_hash);
            (receipt, pending.settle, event)
        };
        let bet_id = receipt.bet_id;
        let _ = settle.send(Ok(receipt));
        self.emit(event);
        bet_id
    }

    /// Reverts the oldest pending wager.
    pub fn revert_next(&self, reason: &str) -> bool {
        let Some(pending) = self.state().pending.pop_front() else {
            return false;
        };
        let _ = pending
            .settle
            .send(Err(Error::ContractRejected(reason.to_string())));
        true
    }

    /// Settles a bet with an outcome decided by the caller and emits
    /// `BetResolved`.
    pub fn resolve(&self, id: BetId, result: u8, won: bool, payout: Amount) -> Result<()> {
        let event = {
            let mut state = self.state();
            let bet = state
                .bets
                .get_mut(&id)
                .ok_or_else(|| Error::ContractRejected(format!("unknown bet {id}")))?;
            if bet.is_resolved() {
                return Err(Error::ContractRejected(format!("bet {id} already resolved")));
            }
            bet.status = BetStatus::Resolved;
            bet.result = Some(result);
            bet.won = won;
            bet.payout = payout;
            let player = bet.player;
            state.total_payout = state.total_payout.saturating_add(payout);
            state.contract_balance = state.contract_balance.saturating_sub(payout);
            let balance = state.balances.entry(player).or_default();
            *balance = balance.saturating_add(payout);
            LedgerEvent::BetResolved {
                id,
                player,
                result,
                won,
                payout,
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Delivers `event` to every matching listener, dropping listeners whose
    /// receiving side has gone away.
    pub fn emit(&self, event: LedgerEvent) {
        let targets: Vec<(SubscriptionId, PushListener)> = self
            .state()
            .listeners
            .iter()
            .filter(|(_, (kind, _))| *kind == event.kind())
            .map(|(id, (_, listener))| (*id, listener.clone()))
            .collect();
        let closed: Vec<SubscriptionId> = targets
            .into_iter()
            .filter(|(_, listener)| !listener.deliver(event.clone()))
            .map(|(id, _)| id)
            .collect();
        if !closed.is_empty() {
            let mut state = self.state();
            for id in closed {
                state.listeners.remove(&id);
            }
        }
    }
}

impl LedgerState {
    fn check(&mut self, binding: &InMemoryContract, op: LedgerOp) -> Result<()> {
        self.calls += 1;
        if binding.network != self.network {
            return Err(Error::rpc(format!(
                "binding for network {} used while wallet is on network {}",
                binding.network, self.network
            )));
        }
        if binding.address != self.contract || self.contract_network != self.network {
            return Err(Error::rpc(format!(
                "no contract at {} on network {}",
                binding.address, self.network
            )));
        }
        if self.failing.contains(&op) {
            return Err(Error::rpc(format!("{op:?} unavailable")));
        }
        Ok(())
    }

    fn accept(
        &mut self,
        request: WagerRequest,
        player: Account,
        tx_hash: String,
    ) -> (TxReceipt, LedgerEvent) {
        let id = self.next_bet_id;
        self.next_bet_id += 1;
        self.total_bets += 1;
        let balance = self.balances.entry(player).or_default();
        *balance = balance.saturating_sub(request.stake);
        self.contract_balance = self.contract_balance.saturating_add(request.stake);
        self.bets.insert(
            id,
            Bet {
                id,
                player,
                stake: request.stake,
                game: request.game,
                prediction: request.prediction,
                result: None,
                won: false,
                status: BetStatus::Pending,
                payout: Amount::ZERO,
                timestamp: Utc::now(),
            },
        );
        let receipt = TxReceipt {
            tx_hash,
            bet_id: Some(id),
        };
        let event = LedgerEvent::BetPlaced {
            id,
            player,
            amount: request.stake,
            game: request.game,
            prediction: request.prediction,
        };
        (receipt, event)
    }
}

fn tx_hash(player: &Account, request: &WagerRequest, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(player.as_bytes());
    hasher.update(request.stake.base_units().to_be_bytes());
    hasher.update([request.prediction]);
    hasher.update(nonce.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

impl LedgerConnector for InMemoryLedger {
    type Client = InMemoryContract;

    fn bind(&self, contract: Address) -> Result<InMemoryContract> {
        Ok(InMemoryContract {
            ledger: self.clone(),
            address: contract,
            network: self.network(),
        })
    }
}

/// A binding of [`InMemoryLedger`] to one contract on one network.
#[derive(Clone)]
pub struct InMemoryContract {
    ledger: InMemoryLedger,
    address: Address,
    network: u64,
}

impl InMemoryContract {
    pub fn network(&self) -> u64 {
        self.network
    }

    fn read<T>(&self, op: LedgerOp, f: impl FnOnce(&LedgerState) -> Result<T>) -> Result<T> {
        let mut state = self.ledger.state();
        state.check(self, op)?;
        f(&state)
    }
}

impl LedgerClient for InMemoryContract {
    async fn read_total_bets(&self) -> Result<u64> {
        self.read(LedgerOp::TotalBets, |s| Ok(s.total_bets))
    }

    async fn read_total_payout(&self) -> Result<Amount> {
        self.read(LedgerOp::TotalPayout, |s| Ok(s.total_payout))
    }

    async fn read_contract_balance(&self) -> Result<Amount> {
        self.read(LedgerOp::ContractBalance, |s| Ok(s.contract_balance))
    }

    async fn read_player_bet_ids(&self, player: &Account) -> Result<Vec<BetId>> {
        self.read(LedgerOp::PlayerBetIds, |s| {
            Ok(s.bets
                .values()
                .filter(|bet| bet.player == *player)
                .map(|bet| bet.id)
                .collect())
        })
    }

    async fn read_bet(&self, id: BetId) -> Result<Bet> {
        self.read(LedgerOp::Bet, |s| {
            s.bets
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::rpc(format!("bet {id} not found")))
        })
    }

    async fn submit_wager<S: Signer>(
        &self,
        request: &WagerRequest,
        signer: &S,
    ) -> Result<TxHandle> {
        let player = signer.address();
        let (confirmed, event) = {
            let mut state = self.ledger.state();
            state.check(self, LedgerOp::Submit)?;
            if let Some(err) = state.reject_next_submit.take() {
                return Err(err);
            }
            let balance = state.balances.get(&player).copied().unwrap_or_default();
            if balance < request.stake {
                return Err(Error::InsufficientFunds);
            }
            let hash = tx_hash(&player, request, state.calls as u64);
            let (handle, settle) = TxHandle::new(hash.clone());
            if state.auto_confirm {
                let (receipt, event) = state.accept(*request, player, hash);
                let _ = settle.send(Ok(receipt));
                (handle, Some(event))
            } else {
                state.pending.push_back(PendingTx {
                    request: *request,
                    player,
                    tx_hash: hash,
                    settle,
                });
                (handle, None)
            }
        };
        if let Some(event) = event {
            self.ledger.emit(event);
        }
        Ok(confirmed)
    }

    fn subscribe(&self, kind: EventKind, listener: PushListener) -> Result<SubscriptionId> {
        let mut state = self.ledger.state();
        state.check(self, LedgerOp::Subscribe)?;
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.listeners.insert(id, (kind, listener));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.ledger.state().listeners.remove(&id);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySigner {
    account: Account,
}

impl MemorySigner {
    pub fn new(account: Account) -> Self {
        Self { account }
    }
}

impl Signer for MemorySigner {
    fn address(&self) -> Account {
        self.account
    }
}

struct WalletState {
    installed: bool,
    approves: bool,
    authorized: bool,
    accounts: Vec<Account>,
    prompts: usize,
}

/// Wallet attached to an [`InMemoryLedger`].
#[derive(Clone)]
pub struct InMemoryWallet {
    ledger: InMemoryLedger,
    state: Arc<Mutex<WalletState>>,
}

impl InMemoryWallet {
    pub fn new(ledger: InMemoryLedger, accounts: Vec<Account>) -> Self {
        Self {
            ledger,
            state: Arc::new(Mutex::new(WalletState {
                installed: true,
                approves: true,
                authorized: false,
                accounts,
                prompts: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_installed(&self, installed: bool) {
        self.state().installed = installed;
    }

    /// Whether the user approves the next access prompts.
    pub fn set_approves(&self, approves: bool) {
        self.state().approves = approves;
    }

    /// Marks the client as already authorised, as after an earlier session.
    pub fn authorize(&self) {
        self.state().authorized = true;
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        self.state().accounts = accounts;
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.state().accounts.clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.state().prompts
    }

    pub fn switch_network(&self, network: u64) {
        self.ledger.switch_network(network);
    }

    fn installed(&self) -> Result<MutexGuard<'_, WalletState>> {
        let state = self.state();
        if !state.installed {
            return Err(Error::ProviderUnavailable);
        }
        Ok(state)
    }
}

impl WalletProvider for InMemoryWallet {
    type Signer = MemorySigner;

    async fn request_accounts(&self) -> Result<Vec<Account>> {
        let mut state = self.installed()?;
        state.prompts += 1;
        if !state.approves {
            return Err(Error::UserRejected);
        }
        state.authorized = true;
        Ok(state.accounts.clone())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let state = self.installed()?;
        if state.authorized {
            Ok(state.accounts.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn balance(&self, account: &Account) -> Result<Amount> {
        drop(self.installed()?);
        Ok(self.ledger.balance_of(account))
    }

    fn signer(&self, account: &Account) -> Result<MemorySigner> {
        let state = self.installed()?;
        if !state.accounts.contains(account) {
            return Err(Error::UserRejected);
        }
        Ok(MemorySigner::new(*account))
    }
}

/// [`ConfigStore`] kept in memory, counting writes.
#[derive(Clone, Default)]
pub struct MemoryConfigStore {
    state: Arc<Mutex<(ClientConfig, usize)>>,
}

impl MemoryConfigStore {
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new((config, 0))),
        }
    }

    pub fn current(&self) -> ClientConfig {
        self.guard().0.clone()
    }

    pub fn write_count(&self) -> usize {
        self.guard().1
    }

    fn guard(&self) -> MutexGuard<'_, (ClientConfig, usize)> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<ClientConfig> {
        Ok(self.current())
    }

    fn save(&mut self, config: &ClientConfig) -> Result<()> {
        let mut guard = self.guard();
        guard.0 = config.clone();
        guard.1 += 1;
        Ok(())
    }
}
