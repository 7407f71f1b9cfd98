//! Wallet Ledger Library
//! # Overview
//!
//! This library provides a double-entry wallet ledger: accounts with
//! balances, and deposits, withdrawals and transfers recorded as immutable
//! transactions with ledger entries. Balances stay correct under concurrent
//! requests through row-level locking with a canonical lock order.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, LedgerEntry, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Deposit, withdraw and transfer as atomic units of work
//!   - [`core::account_service`] - Account creation, balances and history
//!   - [`core::ledger`] - Validated request layer
//!   - [`core::audit`] - Balance invariant check
//! - [`store`] - In-memory and PostgreSQL ledger stores
//! - [`io`] - CSV input and output
//! - [`strategy`] - Sequential and concurrent replay of operation files
//!
//! # Operations
//!
//! - **Deposit**: Credit funds to an account (one credit entry)
//! - **Withdrawal**: Debit funds from an account (requires sufficient balance)
//! - **Transfer**: Debit the source and credit the destination in one transaction
//!
//! # Invariant
//!
//! For every account, the stored balance equals the sum of its credit
//! entries minus the sum of its debit entries.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod store;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use core::{AccountService, Ledger, LedgerStore, TransactionEngine, UnitOfWork};
pub use io::write_accounts_csv;
pub use store::{MemoryStore, StoreConfig};
pub use types::{
    Account, AccountId, AccountSummary, Balance, ErrorKind, LedgerError, Operation, ReplayError,
    TransactionDetail, TransactionHistory, TransactionId,
};
