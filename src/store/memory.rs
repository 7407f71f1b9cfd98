//! In-memory ledger store with row-level locking
//!
//! This module provides `MemoryStore`, a thread-safe store that behaves like a
//! transactional database for the purposes of the engine: every balance row
//! has its own exclusive lock, writes made through a unit of work stay private
//! until commit, and an abandoned unit of work leaves no trace.
//!
//! # Design
//!
//! Tables are `DashMap`s keyed by store-assigned IDs. Each balance row also has
//! an `Arc<tokio::sync::Mutex<()>>`; a `MemoryUnitOfWork` holds the owned guard
//! of every row it locked until it commits, rolls back, or is dropped.
//!
//! Commits apply the staged writes while holding the commit gate in write
//! mode. Plain reads take the gate in read mode, so they observe whole commits
//! only. Reads never touch the row locks and therefore never wait on an
//! in-flight unit of work.
//!
//! # Constraints
//!
//! The store enforces the same constraints the SQL schema declares, reporting
//! violations as `Unavailable`:
//! - ledger entry amounts are strictly positive
//! - entries reference an existing transaction and account
//! - one balance row per account
//! - balance adjustments only on rows locked by the same unit of work

use crate::core::traits::{LedgerStore, UnitOfWork};
use crate::store::StoreConfig;
use crate::types::{
    Account, AccountId, AccountSummary, HistoryFilter, LedgerEntry, LedgerError, LedgerId,
    NewLedgerEntry, Transaction, TransactionDetail, TransactionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// Committed state shared by the store and its units of work
#[derive(Debug, Default)]
struct Tables {
    accounts: DashMap<AccountId, Account>,
    balances: DashMap<AccountId, Decimal>,

    /// One exclusive lock per balance row
    row_locks: DashMap<AccountId, Arc<Mutex<()>>>,

    transactions: DashMap<TransactionId, Transaction>,
    entries: DashMap<LedgerId, LedgerEntry>,

    /// Entry IDs of each account in commit order
    entries_by_account: DashMap<AccountId, Vec<LedgerId>>,

    account_seq: AtomicI64,
    transaction_seq: AtomicI64,
    ledger_seq: AtomicI64,

    /// Write-held while a commit is applied, read-held by plain reads
    commit_gate: RwLock<()>,
}

/// Next value of an ID sequence, starting at 1
///
/// Like a database sequence, values consumed by a rolled-back unit of work
/// are not reused.
fn next_id(sequence: &AtomicI64) -> i64 {
    sequence.fetch_add(1, Ordering::SeqCst) + 1
}

/// Thread-safe in-memory ledger store
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create an empty store with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given configuration
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            tables: Arc::default(),
            config,
        }
    }

    /// Number of committed transactions
    pub fn transaction_count(&self) -> usize {
        self.tables.transactions.len()
    }

    /// Number of committed ledger entries
    pub fn entry_count(&self) -> usize {
        self.tables.entries.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Work = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, LedgerError> {
        Ok(MemoryUnitOfWork {
            tables: Arc::clone(&self.tables),
            lock_timeout: self.config.lock_timeout,
            held: HashMap::new(),
            staged: StagedWrites::default(),
        })
    }

    async fn account_exists(&self, account: AccountId) -> Result<bool, LedgerError> {
        let _gate = self.tables.commit_gate.read().await;
        Ok(self.tables.accounts.contains_key(&account))
    }

    async fn balance(&self, account: AccountId) -> Result<Option<Decimal>, LedgerError> {
        let _gate = self.tables.commit_gate.read().await;
        Ok(self
            .tables
            .balances
            .get(&account)
            .map(|balance| *balance.value()))
    }

    async fn accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let _gate = self.tables.commit_gate.read().await;
        let mut summaries: Vec<AccountSummary> = self
            .tables
            .accounts
            .iter()
            .map(|entry| {
                let account = entry.value();
                AccountSummary {
                    id: account.id,
                    name: account.name.clone(),
                    balance: self
                        .tables
                        .balances
                        .get(&account.id)
                        .map(|balance| *balance.value())
                        .unwrap_or_default(),
                }
            })
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        Ok(summaries)
    }

    async fn history(
        &self,
        account: AccountId,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionDetail>, LedgerError> {
        let _gate = self.tables.commit_gate.read().await;
        let Some(entry_ids) = self.tables.entries_by_account.get(&account) else {
            return Ok(Vec::new());
        };
        let mut details: Vec<TransactionDetail> = entry_ids
            .iter()
            .filter_map(|id| {
                let entry = self.tables.entries.get(id)?;
                let transaction = self.tables.transactions.get(&entry.transaction_id)?;
                filter
                    .contains(transaction.timestamp)
                    .then(|| TransactionDetail {
                        transaction_id: transaction.id,
                        transaction_date: transaction.timestamp,
                        description: transaction.description.clone(),
                        ledger_id: entry.id,
                        account_id: entry.account_id,
                        amount: entry.amount,
                        is_credit: entry.is_credit,
                    })
            })
            .collect();
        drop(entry_ids);

        // Newest first; IDs break ties between equal timestamps
        details.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then(b.transaction_id.cmp(&a.transaction_id))
                .then(b.ledger_id.cmp(&a.ledger_id))
        });
        Ok(details)
    }
}

/// Writes made through a unit of work that are not yet visible
#[derive(Debug, Default)]
struct StagedWrites {
    accounts: Vec<Account>,

    /// Balance rows created by this unit of work, with their current value
    new_balances: HashMap<AccountId, Decimal>,

    /// Pending adjustments to committed balance rows held by this unit of work
    deltas: HashMap<AccountId, Decimal>,

    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
}

impl StagedWrites {
    fn len(&self) -> usize {
        self.accounts.len()
            + self.new_balances.len()
            + self.deltas.len()
            + self.transactions.len()
            + self.entries.len()
    }
}

/// Unit of work against a [`MemoryStore`]
///
/// Holds the guards of every balance row it locked. Dropping it without
/// committing discards the staged writes and releases the guards.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged: StagedWrites,
}

impl MemoryUnitOfWork {
    /// Committed balance plus this unit's pending delta for a held row
    fn current_balance(&self, account: AccountId) -> Option<Decimal> {
        let committed = self
            .tables
            .balances
            .get(&account)
            .map(|balance| *balance.value())?;
        let delta = self
            .staged
            .deltas
            .get(&account)
            .copied()
            .unwrap_or_default();
        committed.checked_add(delta)
    }

    fn account_visible(&self, account: AccountId) -> bool {
        self.staged.accounts.iter().any(|a| a.id == account)
            || self.tables.accounts.contains_key(&account)
    }

    fn transaction_visible(&self, transaction: TransactionId) -> bool {
        self.staged.transactions.iter().any(|t| t.id == transaction)
            || self.tables.transactions.contains_key(&transaction)
    }
}

fn overflow(account: AccountId) -> LedgerError {
    LedgerError::unavailable(format!("balance of account {account} out of range"))
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn account_exists(&mut self, account: AccountId) -> Result<bool, LedgerError> {
        Ok(self.account_visible(account))
    }

    async fn lock_balance(&mut self, account: AccountId) -> Result<Option<Decimal>, LedgerError> {
        // Rows created by this unit are invisible to everyone else
        if let Some(balance) = self.staged.new_balances.get(&account) {
            return Ok(Some(*balance));
        }
        if self.held.contains_key(&account) {
            return Ok(self.current_balance(account));
        }

        let Some(row_lock) = self
            .tables
            .row_locks
            .get(&account)
            .map(|lock| Arc::clone(lock.value()))
        else {
            return Ok(None);
        };

        let guard = tokio::time::timeout(self.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| LedgerError::lock_timeout(account, self.lock_timeout))?;
        self.held.insert(account, guard);

        // Read only after the lock is granted: the previous holder has committed
        Ok(self.current_balance(account))
    }

    async fn insert_account(&mut self, name: &str) -> Result<AccountId, LedgerError> {
        let id = next_id(&self.tables.account_seq);
        self.staged.accounts.push(Account::new(id, name));
        Ok(id)
    }

    async fn insert_balance(
        &mut self,
        account: AccountId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        if self.tables.balances.contains_key(&account)
            || self.staged.new_balances.contains_key(&account)
        {
            return Err(LedgerError::constraint_violation(
                "balances.account_id must be unique",
            ));
        }
        if !self.account_visible(account) {
            return Err(LedgerError::constraint_violation(
                "balances.account_id must reference accounts.id",
            ));
        }
        self.staged.new_balances.insert(account, balance);
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        timestamp: DateTime<Utc>,
        description: &str,
    ) -> Result<TransactionId, LedgerError> {
        let id = next_id(&self.tables.transaction_seq);
        self.staged.transactions.push(Transaction {
            id,
            timestamp,
            description: description.to_string(),
        });
        Ok(id)
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerId, LedgerError> {
        if entry.amount <= Decimal::ZERO {
            return Err(LedgerError::constraint_violation(
                "ledger_entries.amount must be greater than zero",
            ));
        }
        if !self.transaction_visible(entry.transaction_id) {
            return Err(LedgerError::constraint_violation(
                "ledger_entries.transaction_id must reference transactions.id",
            ));
        }
        if !self.account_visible(entry.account_id) {
            return Err(LedgerError::constraint_violation(
                "ledger_entries.account_id must reference accounts.id",
            ));
        }

        let id = next_id(&self.tables.ledger_seq);
        self.staged.entries.push(LedgerEntry {
            id,
            transaction_id: entry.transaction_id,
            account_id: entry.account_id,
            amount: entry.amount,
            is_credit: entry.is_credit,
        });
        Ok(id)
    }

    async fn adjust_balance(
        &mut self,
        account: AccountId,
        delta: Decimal,
    ) -> Result<(), LedgerError> {
        if let Some(balance) = self.staged.new_balances.get_mut(&account) {
            *balance = balance.checked_add(delta).ok_or_else(|| overflow(account))?;
            return Ok(());
        }
        if !self.held.contains_key(&account) {
            return Err(LedgerError::unavailable(format!(
                "balance row of account {account} is not locked by this unit of work"
            )));
        }

        let committed = self
            .tables
            .balances
            .get(&account)
            .map(|balance| *balance.value())
            .ok_or_else(|| LedgerError::account_not_found(account))?;
        let pending = self.staged.deltas.entry(account).or_default();
        let next = pending.checked_add(delta).ok_or_else(|| overflow(account))?;
        committed.checked_add(next).ok_or_else(|| overflow(account))?;
        *pending = next;
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        let MemoryUnitOfWork {
            tables,
            held,
            staged,
            ..
        } = self;
        let writes = staged.len();

        let gate = tables.commit_gate.write().await;

        // Balance rows before row locks, so a granted lock always finds its row
        for (account, balance) in staged.new_balances {
            tables.balances.insert(account, balance);
        }
        for account in staged.accounts {
            tables
                .row_locks
                .insert(account.id, Arc::new(Mutex::new(())));
            tables.accounts.insert(account.id, account);
        }
        for (account, delta) in staged.deltas {
            // Verified against the committed value under the still-held row lock
            if let Some(mut balance) = tables.balances.get_mut(&account) {
                *balance.value_mut() += delta;
            }
        }
        for transaction in staged.transactions {
            tables.transactions.insert(transaction.id, transaction);
        }
        for entry in staged.entries {
            tables
                .entries_by_account
                .entry(entry.account_id)
                .or_default()
                .push(entry.id);
            tables.entries.insert(entry.id, entry);
        }

        drop(gate);
        let locks = held.len();
        drop(held);

        debug!(writes, locks, "memory unit of work committed");
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        debug!(
            discarded = self.staged.len(),
            locks = self.held.len(),
            "memory unit of work rolled back"
        );
        Ok(())
    }
}
