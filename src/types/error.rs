//! Error types for the wallet ledger
//!
//! This module defines the error taxonomy surfaced by the engine and the
//! account service, plus the fatal errors of the replay CLI.
//!
//! # Error Categories
//!
//! - **NotFound**: the account does not exist (on lookup or lock attempt)
//! - **InsufficientFunds**: the operation would drive a balance negative
//! - **InvalidArgument**: rejected by request validation before any unit of work opens
//! - **Unavailable**: the store failed (connection loss, lock timeout, constraint violation)

use crate::types::AccountId;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Stable classification of a [`LedgerError`]
///
/// Callers map these to transport-level responses; the variants never change
/// meaning and are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    NotFound,
    InsufficientFunds,
    InvalidArgument,
    Unavailable,
}

/// Main error type for ledger operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The account does not exist
    ///
    /// Expected business outcome; never retried.
    #[error("Account {account} not found")]
    AccountNotFound {
        /// Account that was looked up or locked
        account: AccountId,
    },

    /// Withdrawal or transfer would overdraw the account
    ///
    /// Expected business outcome; the unit of work is rolled back before any
    /// write and the balance is unchanged.
    #[error("Insufficient funds for account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited
        account: AccountId,
        /// Balance observed under the row lock
        balance: Decimal,
        /// Amount that was requested
        requested: Decimal,
    },

    /// Input failed validation
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Which constraint was violated
        message: String,
    },

    /// The persistence layer failed
    ///
    /// Covers connection loss, lock timeouts and constraint violations. The
    /// caller may retry the whole operation; the ledger never does.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the store failure
        message: String,
    },
}

impl LedgerError {
    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        LedgerError::Unavailable {
            message: message.into(),
        }
    }

    /// Create the Unavailable error reported when a row lock is not granted in time
    pub fn lock_timeout(account: AccountId, waited: Duration) -> Self {
        LedgerError::unavailable(format!(
            "timed out after {}ms waiting for the balance lock of account {account}",
            waited.as_millis()
        ))
    }

    /// Create the Unavailable error reported for a rejected write
    pub fn constraint_violation(constraint: &str) -> Self {
        LedgerError::unavailable(format!("constraint violation: {constraint}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound { .. } => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            LedgerError::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// Whether a caller may reasonably retry the whole operation
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        LedgerError::unavailable(error.to_string())
    }
}

/// Fatal errors of the replay CLI
///
/// Individual operation failures are not fatal; they are counted in the
/// replay summary and processing continues.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Input file could not be opened
    #[error("Failed to open file '{}': {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading input or writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// CSV input stream failed
    #[error("CSV error: {0}")]
    CsvAsync(#[from] csv_async::Error),

    /// A ledger call that the run depends on failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A concurrent lane stopped before reporting its results
    #[error("Lane task failed: {0}")]
    LaneFailed(#[from] tokio::task::JoinError),

    /// The ledger invariant check found inconsistencies
    #[error("Audit failed: {0} inconsistencies found")]
    AuditFailed(usize),
}
