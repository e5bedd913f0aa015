use crate::{
    Result,
    ledger::LedgerClient,
    types::{
        Account,
        Amount,
        Bet,
        BetId,
        BetStatus,
    },
};
use futures::future::try_join_all;
use std::collections::{
    BTreeMap,
    HashMap,
};
use tracing::{
    debug,
    warn,
};

/// Identifies one reload so its completion can be matched to the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadTicket {
    account: Account,
    serial: u64,
}

impl ReloadTicket {
    pub fn account(&self) -> &Account {
        &self.account
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The new set replaced the old one.
    Applied { follow_up: Option<ReloadTicket> },
    /// The fetch failed; the previous set is untouched.
    Failed { follow_up: Option<ReloadTicket> },
    /// Superseded by a newer reload or a clear; nothing was applied.
    Stale,
    /// Folded into the reload already in flight.
    Coalesced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Resolution {
    result: u8,
    won: bool,
    payout: Amount,
}

struct InFlight {
    ticket: ReloadTicket,
    follow_up: bool,
    resolutions: HashMap<BetId, Resolution>,
}

/// Cached copy of the active account's bets, keyed by id.
///
/// The cache is only ever replaced as a whole ([`complete_reload`]) or patched
/// from a resolution push ([`apply_resolved`]).
///
/// [`complete_reload`]: BetHistoryStore::complete_reload
/// [`apply_resolved`]: BetHistoryStore::apply_resolved
#[derive(Default)]
pub struct BetHistoryStore {
    bets: BTreeMap<BetId, Bet>,
    owner: Option<Account>,
    in_flight: Option<InFlight>,
    next_serial: u64,
}

impl BetHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<&Account> {
        self.owner.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    pub fn get(&self, id: BetId) -> Option<&Bet> {
        self.bets.get(&id)
    }

    pub fn is_reloading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn sorted_descending_by_id(&self) -> Vec<&Bet> {
        self.bets.values().rev().collect()
    }

    pub fn win_count(&self) -> usize {
        self.bets.values().filter(|bet| bet.won).count()
    }

    /// Drops every cached bet and orphans any reload in flight.
    pub fn clear(&mut self) {
        self.bets.clear();
        self.owner = None;
        self.in_flight = None;
    }

    /// Starts a reload for `account`, or folds the request into the one
    /// already running for that account.
    pub fn request_reload(&mut self, account: &Account) -> Option<ReloadTicket> {
        if let Some(in_flight) = &mut self.in_flight
            && in_flight.ticket.account == *account
        {
            in_flight.follow_up = true;
            debug!(%account, "bet history reload coalesced");
            return None;
        }
        Some(self.issue_ticket(*account))
    }

    fn issue_ticket(&mut self, account: Account) -> ReloadTicket {
        self.next_serial += 1;
        let ticket = ReloadTicket {
            account,
            serial: self.next_serial,
        };
        self.in_flight = Some(InFlight {
            ticket: ticket.clone(),
            follow_up: false,
            resolutions: HashMap::new(),
        });
        ticket
    }

    /// Reads every bet of `account` from the ledger.
    pub async fn fetch<C: LedgerClient>(client: &C, account: &Account) -> Result<Vec<Bet>> {
        let ids = client.read_player_bet_ids(account).await?;
        try_join_all(ids.into_iter().map(|id| client.read_bet(id))).await
    }

    /// Applies the result of the fetch started for `ticket`.
    pub fn complete_reload(
        &mut self,
        ticket: &ReloadTicket,
        fetched: Result<Vec<Bet>>,
    ) -> ReloadOutcome {
        let Some(in_flight) = self.in_flight.take_if(|f| f.ticket == *ticket) else {
            debug!(account = %ticket.account, "discarding stale bet history reload");
            return ReloadOutcome::Stale;
        };
        let follow_up = in_flight
            .follow_up
            .then(|| self.issue_ticket(ticket.account));
        match fetched {
            Ok(bets) => {
                self.swap_in(ticket.account, bets, in_flight.resolutions);
                ReloadOutcome::Applied { follow_up }
            }
            Err(err) => {
                warn!(%err, account = %ticket.account, "bet history reload failed");
                ReloadOutcome::Failed { follow_up }
            }
        }
    }

    /// Fetches and applies in one go, for callers that own the store across
    /// the await.
    pub async fn reload<C: LedgerClient>(
        &mut self,
        client: &C,
        account: &Account,
    ) -> ReloadOutcome {
        let Some(ticket) = self.request_reload(account) else {
            return ReloadOutcome::Coalesced;
        };
        let fetched = Self::fetch(client, account).await;
        self.complete_reload(&ticket, fetched)
    }

    fn swap_in(
        &mut self,
        owner: Account,
        bets: Vec<Bet>,
        resolutions: HashMap<BetId, Resolution>,
    ) {
        let same_owner = self.owner == Some(owner);
        let mut next: BTreeMap<BetId, Bet> =
            bets.into_iter().map(|bet| (bet.id, bet)).collect();
        if same_owner {
            // a read that started before a resolution must not undo it
            for (id, bet) in next.iter_mut() {
                if let Some(known) = self.bets.get(id)
                    && known.is_resolved()
                    && !bet.is_resolved()
                {
                    *bet = known.clone();
                }
            }
        }
        for (id, resolution) in resolutions {
            if let Some(bet) = next.get_mut(&id) {
                patch(bet, resolution);
            }
        }
        debug!(account = %owner, count = next.len(), "bet history replaced");
        self.bets = next;
        self.owner = Some(owner);
    }

    /// Marks a cached bet resolved. Unknown ids are ignored: the next full
    /// reload will carry the resolved state.
    pub fn apply_resolved(
        &mut self,
        id: BetId,
        result: u8,
        won: bool,
        payout: Amount,
    ) -> bool {
        let resolution = Resolution {
            result,
            won,
            payout,
        };
        if let Some(in_flight) = &mut self.in_flight {
            in_flight.resolutions.insert(id, resolution);
        }
        match self.bets.get_mut(&id) {
            Some(bet) => {
                patch(bet, resolution);
                true
            }
            None => {
                debug!(bet_id = id, "resolution for uncached bet ignored");
                false
            }
        }
    }
}

fn patch(bet: &mut Bet, resolution: Resolution) {
    bet.status = BetStatus::Resolved;
    bet.result = Some(resolution.result);
    bet.won = resolution.won;
    bet.payout = resolution.payout;
}
