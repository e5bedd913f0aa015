use crate::{
    types::{
        Account,
        Address,
        Amount,
        Bet,
        GameKind,
        GameStats,
        Stat,
    },
    wallet::ConnectionState,
};
use itertools::Itertools;
use std::fmt;

pub const NOT_CONNECTED: &str = "Not Connected";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        };
        write!(f, "{label}")
    }
}

/// Presentation collaborator. Pure output: nothing it does flows back into
/// session state.
pub trait Surface {
    fn render(&mut self, view: &SessionView);

    fn notify(&mut self, message: &str, severity: Severity);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsView {
    NotConnected,
    Loading,
    Ready(GameStats),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WagerFormView {
    pub game: GameKind,
    pub prediction: Option<u8>,
    pub stake_input: String,
    pub enabled: bool,
}

/// One-way projection of the session handed to [`Surface::render`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub state: ConnectionState,
    pub account: Option<Account>,
    pub contract: Option<Address>,
    pub balance: Option<Stat<Amount>>,
    pub stats: StatsView,
    /// Newest first.
    pub bets: Vec<Bet>,
    pub wins: usize,
    pub coin: WagerFormView,
    pub dice: WagerFormView,
}

impl SessionView {
    pub fn form(&self, game: GameKind) -> &WagerFormView {
        match game {
            GameKind::Coin => &self.coin,
            GameKind::Dice => &self.dice,
        }
    }

    pub fn stat_labels(&self) -> [String; 3] {
        match &self.stats {
            StatsView::NotConnected => std::array::from_fn(|_| NOT_CONNECTED.to_string()),
            StatsView::Loading => std::array::from_fn(|_| "Loading".to_string()),
            StatsView::Ready(stats) => [
                stats.total_bets.to_string(),
                stats.total_payout.to_string(),
                stats.contract_balance.to_string(),
            ],
        }
    }

    fn bet_line(bet: &Bet) -> String {
        let mut line = format!(
            "{} Bet #{} | Predicted: {} | Result: {} | {} | {}",
            bet.game,
            bet.id,
            bet.prediction_label(),
            bet.result_label(),
            bet.stake,
            bet.outcome_label(),
        );
        if bet.won {
            line.push_str(&format!(" +{}", bet.payout));
        }
        line
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wallet = self
            .account
            .map(|a| a.short())
            .unwrap_or_else(|| NOT_CONNECTED.to_string());
        let balance = match &self.balance {
            Some(balance) => balance.to_string(),
            None => "0".to_string(),
        };
        let contract = self
            .contract
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(not configured)".to_string());
        writeln!(f, "Wallet: {wallet} [{}] balance {balance}", self.state)?;
        writeln!(f, "Contract: {contract}")?;
        let [total_bets, total_payout, contract_balance] = self.stat_labels();
        writeln!(
            f,
            "Total bets: {total_bets} | Total payout: {total_payout} | Contract balance: {contract_balance}"
        )?;
        writeln!(f, "Your wins: {}", self.wins)?;
        for form in [&self.coin, &self.dice] {
            let prediction = form
                .prediction
                .map(|p| form.game.face_label(p))
                .unwrap_or_else(|| "-".to_string());
            let status = if form.enabled { "" } else { " (placing bet...)" };
            writeln!(
                f,
                "{} bet: prediction {prediction} stake '{}'{status}",
                form.game, form.stake_input
            )?;
        }
        if self.bets.is_empty() {
            let empty = match self.state {
                ConnectionState::Connected => "No bets found",
                _ => "Connect wallet to view bet history",
            };
            return writeln!(f, "{empty}");
        }
        writeln!(
            f,
            "{}",
            self.bets.iter().map(SessionView::bet_line).join("\n")
        )
    }
}
