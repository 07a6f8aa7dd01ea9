//! Error types for the token ledger

use crate::types::{Address, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transfer recipient is the null address
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(Address),

    /// Approval spender is the null address
    #[error("Invalid spender: {0}")]
    InvalidSpender(Address),

    /// Debited account holds less than the requested amount
    #[error("Insufficient balance: {account} holds {balance}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited
        account: Address,
        /// Its current balance
        balance: Amount,
        /// Amount the operation tried to move
        requested: Amount,
    },

    /// Spender's remaining allowance is below the requested amount
    #[error("Insufficient allowance: {spender} may spend {allowance} of {owner}, requested {requested}")]
    InsufficientAllowance {
        /// Balance owner
        owner: Address,
        /// Delegated spender
        spender: Address,
        /// Remaining allowance
        allowance: Amount,
        /// Amount the operation tried to move
        requested: Amount,
    },

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invariant violation (supply conservation, arithmetic overflow)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// True for deterministic rejections caused by caller input.
    ///
    /// Rejections never change ledger state; everything else is a host failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidRecipient(_)
                | Error::InvalidSpender(_)
                | Error::InsufficientBalance { .. }
                | Error::InsufficientAllowance { .. }
        )
    }

    /// Stable label used for metrics and structured logs
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidRecipient(_) => "invalid_recipient",
            Error::InvalidSpender(_) => "invalid_spender",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::InsufficientAllowance { .. } => "insufficient_allowance",
            Error::InvalidAddress(_) => "invalid_address",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}
