//! Event-driven session controller.
//!
//! Everything that can change session state arrives as a [`SessionEvent`] on a
//! single queue: user actions, wallet notifications, ledger pushes and the
//! completions of network tasks spawned by the controller itself. Handling an
//! event never blocks; network work is spawned and reports back through
//! [`SessionEvent::Completed`].

use crate::{
    Error,
    Result,
    config::{
        ClientConfig,
        ConfigStore,
        ControllerSettings,
    },
    history::{
        BetHistoryStore,
        ReloadOutcome,
        ReloadTicket,
    },
    ledger::{
        EventKind,
        LedgerClient,
        LedgerConnector,
        LedgerEvent,
        PushListener,
        TxReceipt,
    },
    surface::{
        SessionView,
        Severity,
        StatsView,
        Surface,
        WagerFormView,
    },
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
    wallet::{
        ConnectMode,
        ConnectionState,
        Rebind,
        Signer,
        WalletProvider,
        WalletSession,
        request_access,
    },
};
use std::{
    collections::HashSet,
    ops::ControlFlow,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserAction {
    Connect,
    Disconnect,
    RefreshStats,
    UpdateContractAddress(String),
    SelectPrediction { game: GameKind, prediction: u8 },
    SetStake { game: GameKind, input: String },
    PlaceWager(GameKind),
}

#[derive(Debug)]
pub enum SessionEvent {
    User(UserAction),
    /// Wallet reported a new account list.
    AccountsChanged(Vec<Account>),
    /// Wallet switched networks.
    NetworkChanged,
    /// Ledger push, tagged with the connection epoch that subscribed to it.
    Push { epoch: u64, event: LedgerEvent },
    Completed(TaskOutcome),
    Shutdown,
}

/// Result of a network task spawned by the controller.
#[derive(Debug)]
pub enum TaskOutcome {
    Connect {
        attempt: u64,
        result: Result<Option<Account>>,
    },
    Stats {
        epoch: u64,
        result: Result<GameStats>,
    },
    Balance {
        epoch: u64,
        account: Account,
        result: Result<Amount>,
    },
    History {
        ticket: ReloadTicket,
        result: Result<Vec<Bet>>,
    },
    Wager {
        game: GameKind,
        result: Result<TxReceipt>,
    },
}

/// Sending side of the controller's event queue.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Returns `false` once the controller is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn user(&self, action: UserAction) -> bool {
        self.send(SessionEvent::User(action))
    }

    pub fn accounts_changed(&self, accounts: Vec<Account>) -> bool {
        self.send(SessionEvent::AccountsChanged(accounts))
    }

    pub fn network_changed(&self) -> bool {
        self.send(SessionEvent::NetworkChanged)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }
}

#[derive(Clone, Debug, Default)]
struct WagerForm {
    prediction: Option<u8>,
    stake_input: String,
    pending: bool,
}

impl WagerForm {
    fn view(&self, game: GameKind) -> WagerFormView {
        WagerFormView {
            game,
            prediction: self.prediction,
            stake_input: self.stake_input.clone(),
            enabled: !self.pending,
        }
    }
}

pub struct SessionController<W, L, U, C>
where
    W: WalletProvider,
    L: LedgerConnector,
{
    wallet: W,
    ledger: L,
    surface: U,
    config_store: C,
    config: ClientConfig,
    contract: Option<Address>,
    settings: ControllerSettings,
    session: WalletSession<W::Signer, L::Client>,
    history: BetHistoryStore,
    stats: StatsView,
    balance: Option<Stat<Amount>>,
    coin: WagerForm,
    dice: WagerForm,
    announced: HashSet<BetId>,
    /// Latest account list the wallet reported while a connect was running.
    reported_accounts: Option<Vec<Account>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    in_flight: usize,
}

impl<W, L, U, C> SessionController<W, L, U, C>
where
    W: WalletProvider,
    L: LedgerConnector,
    U: Surface,
    C: ConfigStore,
{
    pub fn new(
        wallet: W,
        ledger: L,
        surface: U,
        config_store: C,
        settings: ControllerSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            wallet,
            ledger,
            surface,
            config_store,
            config: ClientConfig::default(),
            contract: None,
            settings,
            session: WalletSession::new(),
            history: BetHistoryStore::new(),
            stats: StatsView::NotConnected,
            balance: None,
            coin: WagerForm::default(),
            dice: WagerForm::default(),
            announced: HashSet::new(),
            reported_accounts: None,
            events_tx,
            events_rx,
            in_flight: 0,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn account(&self) -> Option<&Account> {
        self.session.account()
    }

    pub fn contract(&self) -> Option<Address> {
        self.contract
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn history(&self) -> &BetHistoryStore {
        &self.history
    }

    pub fn stats(&self) -> &StatsView {
        &self.stats
    }

    pub fn surface(&self) -> &U {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut U {
        &mut self.surface
    }

    /// Number of spawned network tasks that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn view(&self) -> SessionView {
        let state = self.session.state();
        let stats = match state {
            ConnectionState::Connected => self.stats.clone(),
            _ => StatsView::NotConnected,
        };
        SessionView {
            state,
            account: self.session.account().copied(),
            contract: self.contract,
            balance: self.balance,
            stats,
            bets: self
                .history
                .sorted_descending_by_id()
                .into_iter()
                .cloned()
                .collect(),
            wins: self.history.win_count(),
            coin: self.coin.view(GameKind::Coin),
            dice: self.dice.view(GameKind::Dice),
        }
    }

    /// Loads the saved configuration and reconnects silently when an account
    /// is already authorised.
    pub fn start(&mut self) {
        match self.config_store.load() {
            Ok(config) => {
                self.contract = config.contract();
                self.config = config;
            }
            Err(err) => {
                warn!(%err, "could not load client config");
                self.surface
                    .notify(&format!("Could not load settings: {err}"), Severity::Error);
            }
        }
        match self.contract {
            Some(contract) => {
                info!(%contract, "using saved contract address");
                self.connect_with(ConnectMode::Silent);
            }
            None => self.surface.notify(
                "Please set the contract address first, then connect your wallet.",
                Severity::Warning,
            ),
        }
        self.render();
    }

    /// Handles one event and re-renders.
    pub fn dispatch(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::User(action) => self.on_user_action(action),
            SessionEvent::AccountsChanged(accounts) => {
                self.on_external_account_change(accounts)
            }
            SessionEvent::NetworkChanged => self.on_external_network_change(),
            SessionEvent::Push { epoch, event } => self.on_push(epoch, event),
            SessionEvent::Completed(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.on_completed(outcome);
            }
            SessionEvent::Shutdown => {
                info!("session shutting down");
                self.session.disconnect();
                return ControlFlow::Break(());
            }
        }
        self.render();
        ControlFlow::Continue(())
    }

    /// Handles queued events until nothing is queued and no spawned task is
    /// outstanding.
    pub async fn settle(&mut self) {
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(_) if self.in_flight > 0 => match self.events_rx.recv().await {
                    Some(event) => event,
                    None => return,
                },
                Err(_) => return,
            };
            if self.dispatch(event).is_break() {
                return;
            }
        }
    }

    /// Runs until a [`SessionEvent::Shutdown`] arrives, refreshing stats
    /// periodically while connected.
    pub async fn run(mut self) {
        self.start();
        let period = self.settings.stats_refresh_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.session.state() == ConnectionState::Connected {
                        self.refresh_stats();
                        self.render();
                    }
                }
                event = self.events_rx.recv() => {
                    let Some(event) = event else { break };
                    if self.dispatch(event).is_break() {
                        break;
                    }
                }
            }
        }
    }

    fn render(&mut self) {
        let view = self.view();
        self.surface.render(&view);
    }

    fn on_user_action(&mut self, action: UserAction) {
        match action {
            UserAction::Connect => self.connect(),
            UserAction::Disconnect => self.disconnect(),
            UserAction::RefreshStats => {
                if self.session.state() == ConnectionState::Connected {
                    self.refresh_stats();
                } else {
                    self.surface
                        .notify("Please connect your wallet first!", Severity::Error);
                }
            }
            UserAction::UpdateContractAddress(raw) => {
                let _ = self.update_contract_address(&raw);
            }
            UserAction::SelectPrediction { game, prediction } => {
                if let Err(err) = self.select_prediction(game, prediction) {
                    self.surface.notify(&err.to_string(), Severity::Error);
                }
            }
            UserAction::SetStake { game, input } => self.set_stake(game, input),
            UserAction::PlaceWager(game) => {
                let _ = self.place_wager(game);
            }
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        self.in_flight += 1;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            let _ = events.send(SessionEvent::Completed(outcome));
        });
    }

    /// Prompts the wallet for account access.
    pub fn connect(&mut self) {
        if self.contract.is_none() {
            self.surface
                .notify("Please set contract address first!", Severity::Error);
            return;
        }
        match self.session.state() {
            ConnectionState::Disconnected => self.connect_with(ConnectMode::Prompt),
            ConnectionState::Connecting => debug!("connect already in progress"),
            ConnectionState::Connected => {
                self.surface.notify("Wallet already connected", Severity::Info)
            }
        }
    }

    fn connect_with(&mut self, mode: ConnectMode) {
        let Some(attempt) = self.session.begin_connect(mode) else {
            return;
        };
        self.reported_accounts = None;
        let wallet = self.wallet.clone();
        self.spawn(async move {
            let result = request_access(&wallet, mode).await;
            TaskOutcome::Connect { attempt, result }
        });
    }

    fn on_connect_result(&mut self, attempt: u64, result: Result<Option<Account>>) {
        let Some(mode) = self.session.pending_attempt(attempt) else {
            debug!(attempt, "discarding stale connect result");
            return;
        };
        // the wallet's latest report supersedes the list the attempt read
        let reported = self
            .reported_accounts
            .take()
            .and_then(|accounts| accounts.first().copied());
        let result = result.map(|read| reported.or(read));
        match result {
            Ok(Some(account)) => {
                if let Err(err) = self.establish(attempt, mode, account) {
                    self.session.fail_connect(attempt);
                    warn!(%err, %account, "could not bind session");
                    self.surface
                        .notify(&format!("Error connecting wallet: {err}"), Severity::Error);
                }
            }
            Ok(None) => {
                self.session.fail_connect(attempt);
                info!("no authorised account; waiting for the user to connect");
            }
            Err(err) => {
                self.session.fail_connect(attempt);
                match mode {
                    ConnectMode::Prompt => {
                        warn!(%err, "wallet connection failed");
                        self.surface.notify(
                            &format!("Error connecting wallet: {err}"),
                            Severity::Error,
                        );
                    }
                    ConnectMode::Silent if err == Error::ProviderUnavailable => {
                        self.surface.notify(
                            "No wallet provider found. Please install a wallet!",
                            Severity::Warning,
                        );
                    }
                    ConnectMode::Silent => warn!(%err, "silent reconnect failed"),
                }
            }
        }
    }

    fn establish(&mut self, attempt: u64, mode: ConnectMode, account: Account) -> Result<()> {
        let contract = self
            .contract
            .ok_or_else(|| Error::validation("Please set contract address first!"))?;
        let signer = self.wallet.signer(&account)?;
        let client = self.ledger.bind(contract)?;
        let Some(epoch) =
            self.session
                .complete_connect(attempt, account, signer, client.clone())
        else {
            return Ok(());
        };
        for kind in EventKind::ALL {
            match client.subscribe(kind, self.push_listener(epoch)) {
                Ok(id) => self.session.record_subscription(id),
                Err(err) => {
                    warn!(%err, ?kind, "push subscription failed");
                    self.surface.notify(
                        &format!("Live bet updates unavailable: {err}"),
                        Severity::Warning,
                    );
                }
            }
        }
        self.history.clear();
        self.announced.clear();
        self.stats = StatsView::Loading;
        self.balance = None;
        if mode == ConnectMode::Prompt {
            self.surface
                .notify("Wallet connected successfully!", Severity::Success);
        }
        self.refresh_all();
        Ok(())
    }

    fn push_listener(&self, epoch: u64) -> PushListener {
        let events = self.events_tx.clone();
        PushListener::new(move |event| {
            events.send(SessionEvent::Push { epoch, event }).is_ok()
        })
    }

    /// Clears the session and history. Always succeeds.
    pub fn disconnect(&mut self) {
        let before = self.session.disconnect();
        self.clear_session_data();
        if before == ConnectionState::Connected {
            self.surface.notify("Wallet disconnected", Severity::Info);
        }
    }

    fn clear_session_data(&mut self) {
        self.history.clear();
        self.announced.clear();
        self.stats = StatsView::NotConnected;
        self.balance = None;
    }

    pub fn on_external_account_change(&mut self, accounts: Vec<Account>) {
        let Some(first) = accounts.first().copied() else {
            self.disconnect();
            return;
        };
        match self.session.state() {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => {
                debug!(%first, "accounts changed while connecting");
                self.reported_accounts = Some(accounts);
                return;
            }
            ConnectionState::Disconnected => {
                if self.contract.is_some() {
                    self.connect_with(ConnectMode::Silent);
                }
                return;
            }
        }
        let signer = match self.wallet.signer(&first) {
            Ok(signer) => signer,
            Err(err) => {
                warn!(%err, account = %first, "no signer for new account");
                self.disconnect();
                self.surface
                    .notify(&format!("Error switching account: {err}"), Severity::Error);
                return;
            }
        };
        if let Some(Rebind::Switched { .. }) = self.session.rebind(first, signer) {
            self.history.clear();
            self.announced.clear();
            self.balance = None;
            self.surface.notify(
                &format!("Switched to account {}", first.short()),
                Severity::Info,
            );
        }
        self.refresh_all();
    }

    /// Drops everything bound to the old network, then tries to reconnect
    /// without prompting.
    pub fn on_external_network_change(&mut self) {
        let before = self.session.disconnect();
        self.clear_session_data();
        info!(previous = %before, "network changed; session invalidated");
        if before != ConnectionState::Disconnected {
            self.surface
                .notify("Network changed. Reconnecting...", Severity::Warning);
        }
        if self.contract.is_some() {
            self.connect_with(ConnectMode::Silent);
        }
    }

    /// Validates and persists a new contract address, then re-checks the
    /// connection against it. Malformed input is never written.
    pub fn update_contract_address(&mut self, raw: &str) -> Result<()> {
        let result = self.apply_contract_address(raw);
        if let Err(err) = &result {
            self.surface.notify(&err.to_string(), Severity::Error);
        }
        result
    }

    fn apply_contract_address(&mut self, raw: &str) -> Result<()> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::validation("Please enter a contract address!"));
        }
        let address: Address = raw
            .parse()
            .map_err(|_| Error::validation("Please enter a valid contract address!"))?;
        let config = ClientConfig {
            contract_address: Some(raw.to_string()),
        };
        self.config_store.save(&config)?;
        info!(%address, "contract address updated");
        self.config = config;
        self.contract = Some(address);
        self.surface.notify(
            "Contract address updated! Now connect your wallet.",
            Severity::Success,
        );
        self.session.disconnect();
        self.clear_session_data();
        self.connect_with(ConnectMode::Silent);
        Ok(())
    }

    fn form(&self, game: GameKind) -> &WagerForm {
        match game {
            GameKind::Coin => &self.coin,
            GameKind::Dice => &self.dice,
        }
    }

    fn form_mut(&mut self, game: GameKind) -> &mut WagerForm {
        match game {
            GameKind::Coin => &mut self.coin,
            GameKind::Dice => &mut self.dice,
        }
    }

    pub fn select_prediction(&mut self, game: GameKind, prediction: u8) -> Result<()> {
        let prediction = game.validate_prediction(prediction)?;
        self.form_mut(game).prediction = Some(prediction);
        Ok(())
    }

    pub fn set_stake(&mut self, game: GameKind, input: String) {
        self.form_mut(game).stake_input = input;
    }

    fn prepare_wager(&self, game: GameKind) -> Result<WagerRequest> {
        if self.contract.is_none() {
            return Err(Error::validation("Please set contract address first!"));
        }
        if self.session.state() != ConnectionState::Connected {
            return Err(Error::validation("Please connect your wallet first!"));
        }
        let form = self.form(game);
        if form.pending {
            return Err(Error::validation(format!(
                "A {game} bet is already waiting for confirmation!"
            )));
        }
        let prediction = form.prediction.ok_or_else(|| {
            Error::validation(match game {
                GameKind::Coin => "Please select heads or tails!",
                GameKind::Dice => "Please select a number (1-6)!",
            })
        })?;
        let stake = Amount::parse_decimal(&form.stake_input)
            .ok()
            .filter(|stake| !stake.is_zero())
            .ok_or_else(|| Error::validation("Please enter a valid bet amount!"))?;
        WagerRequest::new(game, prediction, stake)
    }

    /// Validates the game's form and submits the wager. Validation failures
    /// are returned before any network call is made.
    pub fn place_wager(&mut self, game: GameKind) -> Result<()> {
        let request = match self.prepare_wager(game) {
            Ok(request) => request,
            Err(err) => {
                self.surface.notify(&err.to_string(), Severity::Error);
                return Err(err);
            }
        };
        let Some(connection) = self.session.connection() else {
            return Err(Error::validation("Please connect your wallet first!"));
        };
        let client = connection.contract.clone();
        let signer = connection.signer.clone();
        let timeout = self.settings.confirmation_timeout;
        self.form_mut(game).pending = true;
        self.surface.notify(
            "Bet submitted! Waiting for confirmation...",
            Severity::Warning,
        );
        info!(%game, prediction = request.prediction, stake = %request.stake, "placing wager");
        self.spawn(async move {
            let result = submit_and_confirm(client, signer, request, timeout).await;
            TaskOutcome::Wager { game, result }
        });
        Ok(())
    }

    fn on_wager_result(&mut self, game: GameKind, result: Result<TxReceipt>) {
        self.form_mut(game).pending = false;
        match result {
            Ok(receipt) => {
                info!(tx = %receipt.tx_hash, bet_id = ?receipt.bet_id, "wager confirmed");
                let form = self.form_mut(game);
                form.prediction = None;
                form.stake_input.clear();
                self.surface.notify(
                    &format!("{game} bet placed successfully!"),
                    Severity::Success,
                );
                self.refresh_all();
            }
            Err(err) => {
                error!(%err, %game, "wager failed");
                self.surface
                    .notify(&format!("Error placing bet: {err}"), Severity::Error);
            }
        }
    }

    /// Re-reads stats, bet history and wallet balance.
    pub fn refresh_all(&mut self) {
        self.refresh_stats();
        self.reload_history();
        self.refresh_balance();
    }

    pub fn refresh_stats(&mut self) {
        let Some(connection) = self.session.connection() else {
            self.stats = StatsView::NotConnected;
            return;
        };
        let client = connection.contract.clone();
        let epoch = connection.epoch;
        if self.stats == StatsView::NotConnected {
            self.stats = StatsView::Loading;
        }
        self.spawn(async move {
            let result = client.read_stats().await;
            TaskOutcome::Stats { epoch, result }
        });
    }

    fn refresh_balance(&mut self) {
        let Some(connection) = self.session.connection() else {
            return;
        };
        let account = connection.account;
        let epoch = connection.epoch;
        let wallet = self.wallet.clone();
        self.spawn(async move {
            let result = wallet.balance(&account).await;
            TaskOutcome::Balance {
                epoch,
                account,
                result,
            }
        });
    }

    fn reload_history(&mut self) {
        let Some(account) = self.session.account().copied() else {
            return;
        };
        if let Some(ticket) = self.history.request_reload(&account) {
            self.spawn_reload(ticket);
        }
    }

    fn spawn_reload(&mut self, ticket: ReloadTicket) {
        let Some(connection) = self.session.connection() else {
            return;
        };
        let client = connection.contract.clone();
        self.spawn(async move {
            let result = BetHistoryStore::fetch(&client, ticket.account()).await;
            TaskOutcome::History { ticket, result }
        });
    }

    fn on_completed(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Connect { attempt, result } => {
                self.on_connect_result(attempt, result)
            }
            TaskOutcome::Stats { epoch, result } => {
                if self.session.epoch() != Some(epoch) {
                    debug!(epoch, "discarding stats for a closed connection");
                    return;
                }
                self.stats = match result {
                    Ok(stats) => StatsView::Ready(stats),
                    Err(err) => {
                        warn!(%err, "stats unavailable");
                        self.surface
                            .notify(&format!("Failed to load stats: {err}"), Severity::Error);
                        StatsView::Ready(GameStats::unavailable())
                    }
                };
            }
            TaskOutcome::Balance {
                epoch,
                account,
                result,
            } => {
                if self.session.epoch() != Some(epoch)
                    || self.session.account() != Some(&account)
                {
                    debug!(%account, "discarding balance for an inactive account");
                    return;
                }
                if let Err(err) = &result {
                    warn!(%err, %account, "balance read failed");
                    self.surface.notify(
                        &format!("Failed to load balance: {err}"),
                        Severity::Warning,
                    );
                }
                self.balance = Some(Stat::from(result));
            }
            TaskOutcome::History { ticket, result } => {
                let failure = result.as_ref().err().map(ToString::to_string);
                match self.history.complete_reload(&ticket, result) {
                    ReloadOutcome::Applied { follow_up } => {
                        if let Some(next) = follow_up {
                            self.spawn_reload(next);
                        }
                    }
                    ReloadOutcome::Failed { follow_up } => {
                        if let Some(message) = failure {
                            self.surface.notify(
                                &format!("Error loading bet history: {message}"),
                                Severity::Error,
                            );
                        }
                        if let Some(next) = follow_up {
                            self.spawn_reload(next);
                        }
                    }
                    ReloadOutcome::Stale | ReloadOutcome::Coalesced => {}
                }
            }
            TaskOutcome::Wager { game, result } => self.on_wager_result(game, result),
        }
    }

    fn on_push(&mut self, epoch: u64, event: LedgerEvent) {
        if self.session.epoch() != Some(epoch) {
            debug!(epoch, bet_id = event.bet_id(), "discarding push for a closed connection");
            return;
        }
        if self.session.account() != Some(event.player()) {
            return;
        }
        match event {
            LedgerEvent::BetPlaced { id, .. } => {
                debug!(bet_id = id, "own bet placed");
                self.surface
                    .notify("Bet placed! Waiting for result...", Severity::Warning);
                self.reload_history();
                self.refresh_stats();
            }
            LedgerEvent::BetResolved {
                id,
                result,
                won,
                payout,
                ..
            } => {
                self.history.apply_resolved(id, result, won, payout);
                if self.announced.insert(id) {
                    info!(bet_id = id, won, %payout, "bet resolved");
                    if won {
                        self.surface.notify(
                            &format!("Congratulations! You won {payout} ETH!"),
                            Severity::Success,
                        );
                    } else {
                        self.surface.notify(
                            "Sorry, you lost this bet. Better luck next time!",
                            Severity::Error,
                        );
                    }
                }
                self.refresh_all();
            }
        }
    }
}

async fn submit_and_confirm<Client, S>(
    client: Client,
    signer: S,
    request: WagerRequest,
    timeout: Option<Duration>,
) -> Result<TxReceipt>
where
    Client: LedgerClient,
    S: Signer,
{
    let handle = client.submit_wager(&request, &signer).await?;
    debug!(tx = handle.tx_hash(), "wager submitted");
    match timeout {
        Some(limit) => time::timeout(limit, handle.confirmation())
            .await
            .map_err(|_| Error::ConfirmationTimeout)?,
        None => handle.confirmation().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::TestContext;

    #[test]
    fn view__shows_not_connected_before_start() {
        let ctx = TestContext::new();
        let controller = ctx.controller();

        let view = controller.view();

        assert_eq!(view.state, ConnectionState::Disconnected);
        assert_eq!(view.stats, StatsView::NotConnected);
        assert!(view.bets.is_empty());
        assert!(view.coin.enabled && view.dice.enabled);
    }

    #[tokio::test]
    async fn handle__queues_events_until_settled() {
        // given
        let ctx = TestContext::new();
        let mut controller = ctx.controller();
        let handle = controller.handle();

        // when
        handle.user(UserAction::SetStake {
            game: GameKind::Coin,
            input: "0.5".to_string(),
        });
        assert_eq!(controller.view().coin.stake_input, "");
        controller.settle().await;

        // then
        assert_eq!(controller.view().coin.stake_input, "0.5");
    }

    #[tokio::test]
    async fn dispatch__shutdown_stops_and_tears_down_connection() {
        // given
        let ctx = TestContext::new();
        let mut controller = ctx.connected_controller().await;

        // when
        let flow = controller.dispatch(SessionEvent::Shutdown);

        // then
        assert!(flow.is_break());
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert_eq!(ctx.ledger.listener_count(), 0);
    }
}
