use thiserror::Error;

/// Failures surfaced by the session layer.
///
/// None of these are fatal: every variant ends up as a user notification at
/// the boundary of the operation that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Bad user input. Never reaches the network.
    #[error("{0}")]
    Validation(String),
    #[error("no wallet provider is available")]
    ProviderUnavailable,
    #[error("request was rejected in the wallet")]
    UserRejected,
    #[error("insufficient funds for this wager")]
    InsufficientFunds,
    #[error("contract rejected the transaction: {0}")]
    ContractRejected(String),
    #[error("ledger request failed: {0}")]
    Rpc(String),
    #[error("timed out waiting for transaction confirmation")]
    ConfirmationTimeout,
    #[error("configuration storage failed: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Error::Rpc(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}
