//! Core traits for the persistence capability and the clock
//!
//! The engine and the account service never reach a store directly; they are
//! handed a `LedgerStore` and drive it through `UnitOfWork` values. Both the
//! in-memory store and the PostgreSQL store implement these traits.

use crate::types::{
    AccountId, AccountSummary, HistoryFilter, LedgerError, LedgerId, NewLedgerEntry,
    TransactionDetail, TransactionId,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

/// Durable storage of accounts, balances, and the ledger
///
/// Reads on the store itself are plain, unlocked reads of committed state and
/// never wait on row locks held by in-flight units of work.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Unit of work type produced by [`LedgerStore::begin`]
    type Work: UnitOfWork;

    /// Open a new atomic unit of work
    async fn begin(&self) -> Result<Self::Work, LedgerError>;

    /// Whether an account with this ID has been committed
    async fn account_exists(&self, account: AccountId) -> Result<bool, LedgerError>;

    /// Committed balance of an account, `None` if it does not exist
    async fn balance(&self, account: AccountId) -> Result<Option<Decimal>, LedgerError>;

    /// Every account with its committed balance, ordered by ID
    async fn accounts(&self) -> Result<Vec<AccountSummary>, LedgerError>;

    /// Entries of one account joined with their transactions, newest first
    async fn history(
        &self,
        account: AccountId,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionDetail>, LedgerError>;
}

/// One atomic unit of work against a [`LedgerStore`]
///
/// Nothing written through a unit of work is visible to others until
/// [`UnitOfWork::commit`] succeeds. Dropping a unit of work without committing
/// rolls it back and releases every row lock it holds.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Whether an account is visible to this unit of work
    ///
    /// Runs on the unit's own connection; committed accounts and accounts
    /// inserted by this unit both count.
    async fn account_exists(&mut self, account: AccountId) -> Result<bool, LedgerError>;

    /// Acquire the exclusive lock on an account's balance row and read it
    ///
    /// Blocks while another unit of work holds the row. Returns `None` when
    /// the row does not exist. Locking a row this unit of work already holds
    /// returns its current value without waiting.
    async fn lock_balance(&mut self, account: AccountId) -> Result<Option<Decimal>, LedgerError>;

    /// Insert an account and return its new ID
    async fn insert_account(&mut self, name: &str) -> Result<AccountId, LedgerError>;

    /// Insert the balance row of an account created in this unit of work
    async fn insert_balance(
        &mut self,
        account: AccountId,
        balance: Decimal,
    ) -> Result<(), LedgerError>;

    /// Append a transaction record and return its new ID
    async fn insert_transaction(
        &mut self,
        timestamp: DateTime<Utc>,
        description: &str,
    ) -> Result<TransactionId, LedgerError>;

    /// Append a ledger entry and return its new ID
    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerId, LedgerError>;

    /// Add a signed delta to a balance row locked by this unit of work
    async fn adjust_balance(&mut self, account: AccountId, delta: Decimal)
        -> Result<(), LedgerError>;

    /// Make every write visible atomically and release all row locks
    async fn commit(self) -> Result<(), LedgerError>;

    /// Discard every write and release all row locks
    async fn rollback(self) -> Result<(), LedgerError>;
}

/// Source of transaction timestamps
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Holds milliseconds since the Unix epoch.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
