//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`StorageUnavailable`] and [`Database`] when the ledger backing store
//!   fails or does not answer in time. These are the only fatal errors: the
//!   operation that hit them left no partial mutation behind.
//! - [`EmptyQueue`] when a resolution is attempted with nothing pending.
//! - [`NotAuthorized`] when the reviewer lacks the privilege to resolve.
//! - [`BalanceOverflow`] when a credit would push a balance past `i64::MAX`;
//!   the balance is left untouched.
//!
//! Non-positive increments and decrements are not errors, they are no-ops.
//!
//!  [`StorageUnavailable`]: EngineError::StorageUnavailable
//!  [`Database`]: EngineError::Database
//!  [`EmptyQueue`]: EngineError::EmptyQueue
//!  [`NotAuthorized`]: EngineError::NotAuthorized
//!  [`BalanceOverflow`]: EngineError::BalanceOverflow
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("No submissions pending")]
    EmptyQueue,
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Balance overflow: {0}")]
    BalanceOverflow(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for the fatal ledger errors (the backing medium failed).
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::StorageUnavailable(a), Self::StorageUnavailable(b)) => a == b,
            (Self::EmptyQueue, Self::EmptyQueue) => true,
            (Self::NotAuthorized(a), Self::NotAuthorized(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InvalidTransfer(a), Self::InvalidTransfer(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::BalanceOverflow(a), Self::BalanceOverflow(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
