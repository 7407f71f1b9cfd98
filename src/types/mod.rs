//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account identity and balance snapshots
//! - `transaction`: Ledger records, history rows, and postings
//! - `operation`: Validated request-layer operations
//! - `error`: Error taxonomy for the ledger and the replay CLI

pub mod account;
pub mod error;
pub mod operation;
pub mod transaction;

pub use account::{Account, AccountId, AccountSummary, Balance};
pub use error::{ErrorKind, LedgerError, ReplayError};
pub use operation::{Operation, OperationKind, OperationRecord};
pub use transaction::{
    EntrySide, HistoryFilter, LedgerEntry, LedgerId, Leg, NewLedgerEntry, Posting, Transaction,
    TransactionDetail, TransactionHistory, TransactionId,
};
