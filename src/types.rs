use crate::{
    Error,
    Result,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// Base units per whole coin.
pub const AMOUNT_DECIMALS: u32 = 18;
const DISPLAY_DECIMALS: u32 = 4;
const ADDRESS_LEN: usize = 20;

pub type BetId = u64;

/// A 20-byte ledger address, written as `0x` followed by 40 hex digits.
///
/// Parsing accepts either case, so two textual forms of the same address
/// compare equal once parsed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LEN]);

/// The externally issued identity of a wallet user.
pub type Account = Address;

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// `0x1234...abcd`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| {
                Error::validation(format!("address '{trimmed}' must start with 0x"))
            })?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(Error::validation(format!(
                "address '{trimmed}' must have {} hex digits",
                ADDRESS_LEN * 2
            )));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| {
            Error::validation(format!("address '{trimmed}' is not valid hex: {e}"))
        })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A non-negative token amount in base units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub fn from_whole(coins: u64) -> Self {
        Self(u128::from(coins) * one_coin())
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn saturating_mul(self, factor: u128) -> Amount {
        Amount(self.0.saturating_mul(factor))
    }

    /// Parses user input such as `"0.25"` or `"3"` into base units.
    pub fn parse_decimal(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || Error::validation(format!("'{trimmed}' is not a valid amount"));
        if trimmed.is_empty() {
            return Err(Error::validation("amount is empty"));
        }
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid());
        }
        if fraction.len() > AMOUNT_DECIMALS as usize {
            return Err(Error::validation(format!(
                "'{trimmed}' has more than {AMOUNT_DECIMALS} decimal places"
            )));
        }
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| invalid())?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = AMOUNT_DECIMALS as usize);
            padded.parse::<u128>().map_err(|_| invalid())?
        };
        whole_units
            .checked_mul(one_coin())
            .and_then(|units| units.checked_add(fraction_units))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Amount {
    /// Rounded to four decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = 10u128.pow(AMOUNT_DECIMALS - DISPLAY_DECIMALS);
        let rounded = self.0.saturating_add(step / 2) / step;
        let scale = 10u128.pow(DISPLAY_DECIMALS);
        write!(
            f,
            "{}.{:0width$}",
            rounded / scale,
            rounded % scale,
            width = DISPLAY_DECIMALS as usize
        )
    }
}

fn one_coin() -> u128 {
    10u128.pow(AMOUNT_DECIMALS)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    Coin,
    Dice,
}

impl GameKind {
    pub const ALL: [GameKind; 2] = [GameKind::Coin, GameKind::Dice];

    pub fn accepts(self, prediction: u8) -> bool {
        match self {
            GameKind::Coin => prediction <= 1,
            GameKind::Dice => (1..=6).contains(&prediction),
        }
    }

    pub fn validate_prediction(self, prediction: u8) -> Result<u8> {
        if self.accepts(prediction) {
            Ok(prediction)
        } else {
            Err(Error::validation(match self {
                GameKind::Coin => format!("{prediction} is not heads (0) or tails (1)"),
                GameKind::Dice => format!("{prediction} is not a dice face (1-6)"),
            }))
        }
    }

    /// Human label for a prediction or result of this game.
    pub fn face_label(self, value: u8) -> String {
        match (self, value) {
            (GameKind::Coin, 0) => "Heads".to_string(),
            (GameKind::Coin, _) => "Tails".to_string(),
            (GameKind::Dice, n) => n.to_string(),
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Coin => write!(f, "Coin"),
            GameKind::Dice => write!(f, "Dice"),
        }
    }
}

/// A single wager submission, validated on construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WagerRequest {
    pub game: GameKind,
    pub prediction: u8,
    pub stake: Amount,
}

impl WagerRequest {
    pub fn new(game: GameKind, prediction: u8, stake: Amount) -> Result<Self> {
        let prediction = game.validate_prediction(prediction)?;
        if stake.is_zero() {
            return Err(Error::validation("stake must be greater than zero"));
        }
        Ok(Self {
            game,
            prediction,
            stake,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetStatus {
    Pending,
    Resolved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub player: Account,
    pub stake: Amount,
    pub game: GameKind,
    pub prediction: u8,
    pub result: Option<u8>,
    pub won: bool,
    pub status: BetStatus,
    pub payout: Amount,
    pub timestamp: DateTime<Utc>,
}

impl Bet {
    pub fn is_resolved(&self) -> bool {
        self.status == BetStatus::Resolved
    }

    pub fn prediction_label(&self) -> String {
        self.game.face_label(self.prediction)
    }

    pub fn result_label(&self) -> String {
        match (self.status, self.result) {
            (BetStatus::Resolved, Some(result)) => self.game.face_label(result),
            _ => "Pending".to_string(),
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match (self.status, self.won) {
            (BetStatus::Pending, _) => "Pending",
            (BetStatus::Resolved, true) => "Won",
            (BetStatus::Resolved, false) => "Lost",
        }
    }
}

/// One field of a remote read that may have failed on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stat<T> {
    Available(T),
    Unavailable,
}

impl<T> Stat<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Stat::Available(v) => Some(v),
            Stat::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Stat::Available(_))
    }
}

impl<T: fmt::Display> fmt::Display for Stat<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Available(v) => write!(f, "{v}"),
            Stat::Unavailable => write!(f, "Unavailable"),
        }
    }
}

impl<T, E> From<std::result::Result<T, E>> for Stat<T> {
    fn from(value: std::result::Result<T, E>) -> Self {
        match value {
            Ok(v) => Stat::Available(v),
            Err(_) => Stat::Unavailable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameStats {
    pub total_bets: Stat<u64>,
    pub total_payout: Stat<Amount>,
    pub contract_balance: Stat<Amount>,
}

impl GameStats {
    pub fn unavailable() -> Self {
        Self {
            total_bets: Stat::Unavailable,
            total_payout: Stat::Unavailable,
            contract_balance: Stat::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn address__parses_mixed_case_and_prints_lowercase() {
        // given
        let raw = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

        // when
        let address: Address = raw.parse().unwrap();

        // then
        assert_eq!(
            address.to_string(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
        assert_eq!(address, raw.to_lowercase().parse().unwrap());
        assert_eq!(address.short(), "0x5fbd...0aa3");
    }

    #[test]
    fn address__rejects_malformed_input() {
        for raw in [
            "",
            "5FbDB2315678afecb367f032d93F642f64180aa3",
            "0x5FbDB2315678afecb367f032d93F642f64180aa",
            "0xZZbDB2315678afecb367f032d93F642f64180aa3",
        ] {
            let err = raw.parse::<Address>().unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{raw}: {err:?}");
        }
    }

    #[test]
    fn amount__parse_decimal_handles_fractions() {
        assert_eq!(
            Amount::parse_decimal("1.5").unwrap(),
            Amount::from_base_units(1_500_000_000_000_000_000)
        );
        assert_eq!(
            Amount::parse_decimal(".01").unwrap(),
            Amount::from_base_units(10_000_000_000_000_000)
        );
        assert_eq!(Amount::parse_decimal("2").unwrap(), Amount::from_whole(2));
    }

    #[test]
    fn amount__parse_decimal_rejects_garbage() {
        for raw in ["", ".", "-1", "1.2.3", "abc", "0.0000000000000000001"] {
            assert!(Amount::parse_decimal(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn amount__display_rounds_to_four_decimals() {
        let amount = Amount::parse_decimal("0.123456").unwrap();
        assert_eq!(amount.to_string(), "0.1235");
        assert_eq!(Amount::from_whole(3).to_string(), "3.0000");
    }

    #[test]
    fn wager_request__validates_prediction_range_per_game() {
        let stake = Amount::from_whole(1);
        assert!(WagerRequest::new(GameKind::Coin, 1, stake).is_ok());
        assert!(WagerRequest::new(GameKind::Coin, 2, stake).is_err());
        assert!(WagerRequest::new(GameKind::Dice, 0, stake).is_err());
        assert!(WagerRequest::new(GameKind::Dice, 6, stake).is_ok());
        assert!(WagerRequest::new(GameKind::Dice, 3, Amount::ZERO).is_err());
    }
}
