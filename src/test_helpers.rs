use crate::{
    config::{
        ClientConfig,
        ControllerSettings,
    },
    controller::{
        SessionController,
        SessionEvent,
        UserAction,
    },
    memory::{
        InMemoryLedger,
        InMemoryWallet,
        MemoryConfigStore,
    },
    surface::{
        SessionView,
        Severity,
        Surface,
    },
    types::{
        Account,
        Address,
        Amount,
        GameKind,
    },
    wallet::ConnectionState,
};
use std::time::Duration;

/// Surface that keeps everything it is given.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub renders: Vec<SessionView>,
    pub notifications: Vec<(String, Severity)>,
}

impl RecordingSurface {
    pub fn last_view(&self) -> Option<&SessionView> {
        self.renders.last()
    }

    pub fn last_notification(&self) -> Option<&(String, Severity)> {
        self.notifications.last()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.notifications.iter().map(|(m, _)| m.as_str()).collect()
    }

    pub fn count(&self, message: &str) -> usize {
        self.notifications
            .iter()
            .filter(|(m, _)| m == message)
            .count()
    }

    pub fn clear(&mut self) {
        self.renders.clear();
        self.notifications.clear();
    }
}

impl Surface for RecordingSurface {
    fn render(&mut self, view: &SessionView) {
        self.renders.push(view.clone());
    }

    fn notify(&mut self, message: &str, severity: Severity) {
        self.notifications.push((message.to_string(), severity));
    }
}

pub type TestController = SessionController<
    InMemoryWallet,
    InMemoryLedger,
    RecordingSurface,
    MemoryConfigStore,
>;

pub const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

pub struct TestContext {
    pub ledger: InMemoryLedger,
    pub wallet: InMemoryWallet,
    pub config: MemoryConfigStore,
    pub contract: Address,
    pub alice: Account,
    pub bob: Account,
    pub settings: ControllerSettings,
}

impl TestContext {
    /// Ledger with a funded contract, two funded players and the contract
    /// address already saved.
    pub fn new() -> Self {
        let contract: Address = CONTRACT.parse().unwrap();
        let alice = Address::new([0xa1; 20]);
        let bob = Address::new([0xb0; 20]);
        let ledger = InMemoryLedger::new(contract);
        ledger.fund_contract(Amount::from_whole(100));
        ledger.fund(alice, Amount::from_whole(10));
        ledger.fund(bob, Amount::from_whole(10));
        let wallet = InMemoryWallet::new(ledger.clone(), vec![alice, bob]);
        let config = MemoryConfigStore::with_config(ClientConfig {
            contract_address: Some(CONTRACT.to_string()),
        });
        Self {
            ledger,
            wallet,
            config,
            contract,
            alice,
            bob,
            settings: ControllerSettings::default(),
        }
    }

    pub fn without_contract() -> Self {
        let mut ctx = Self::new();
        ctx.config = MemoryConfigStore::default();
        ctx
    }

    pub fn controller(&self) -> TestController {
        SessionController::new(
            self.wallet.clone(),
            self.ledger.clone(),
            RecordingSurface::default(),
            self.config.clone(),
            self.settings,
        )
    }

    /// Started controller, connected as alice through the wallet prompt.
    pub async fn connected_controller(&self) -> TestController {
        let mut controller = self.controller();
        controller.start();
        controller.settle().await;
        controller.dispatch(SessionEvent::User(UserAction::Connect));
        controller.settle().await;
        assert_eq!(controller.state(), ConnectionState::Connected);
        controller
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fills in the form for `game` and submits it.
pub fn place(controller: &mut TestController, game: GameKind, prediction: u8, stake: &str) {
    controller.dispatch(SessionEvent::User(UserAction::SelectPrediction {
        game,
        prediction,
    }));
    controller.dispatch(SessionEvent::User(UserAction::SetStake {
        game,
        input: stake.to_string(),
    }));
    controller.dispatch(SessionEvent::User(UserAction::PlaceWager(game)));
}

/// Settles for at most `limit`. Returns `false` when tasks are still
/// outstanding, e.g. a wager waiting on a manual confirmation.
pub async fn settle_within(controller: &mut TestController, limit: Duration) -> bool {
    tokio::time::timeout(limit, controller.settle()).await.is_ok()
}
