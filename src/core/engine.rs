//! Transaction engine
//!
//! This module provides the `TransactionEngine`, the only component allowed to
//! change a balance. Every deposit, withdrawal, and transfer runs as one unit
//! of work against the injected `LedgerStore`:
//!
//! ```text
//! Open -> Locking -> Checking -> Writing -> Committed
//!            \          \           \
//!             +----------+-----------+--> RolledBack
//! ```
//!
//! # Locking protocol
//!
//! - Every account of a posting is existence-checked before any row is locked,
//!   on the unit of work's own connection.
//! - Balance rows are locked in ascending account-ID order, whatever the
//!   direction of the transfer. Two units of work sharing accounts therefore
//!   request their locks in the same relative order and cannot wait on each
//!   other in a cycle.
//! - Funds checks happen strictly after the locks are held, so no concurrent
//!   unit of work can change the balance between the check and the write.
//!
//! The engine keeps no state of its own between calls; the store's row locks
//! are the only mutual exclusion. It never retries.

use crate::core::traits::{Clock, LedgerStore, SystemClock, UnitOfWork};
use crate::types::{
    AccountId, ErrorKind, LedgerError, NewLedgerEntry, Posting, TransactionId,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

/// Progress of one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkPhase {
    Open,
    Locking,
    Checking,
    Writing,
    Committed,
    RolledBack,
}

/// Lock the balance rows of `accounts` in ascending ID order
///
/// Duplicate IDs are locked once. Returns the balance read under each lock.
/// A missing row fails with `AccountNotFound`; locks already taken stay with
/// the unit of work and are released when it rolls back.
pub async fn lock_in_order<W, I>(
    work: &mut W,
    accounts: I,
) -> Result<BTreeMap<AccountId, Decimal>, LedgerError>
where
    W: UnitOfWork,
    I: IntoIterator<Item = AccountId>,
{
    let ordered: BTreeSet<AccountId> = accounts.into_iter().collect();
    let mut balances = BTreeMap::new();

    for account in ordered {
        let balance = work
            .lock_balance(account)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account))?;
        trace!(account, %balance, "balance row locked");
        balances.insert(account, balance);
    }

    Ok(balances)
}

/// Orchestrates balance-affecting operations over a `LedgerStore`
///
/// Cheap to clone; clones share the store and the clock.
pub struct TransactionEngine<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> Clone for TransactionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LedgerStore> fmt::Debug for TransactionEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> TransactionEngine<S> {
    /// Create an engine stamping transactions with the wall clock
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Credit `amount` to an account
    ///
    /// The caller has already checked that `amount > 0` and that the
    /// description is valid.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - the account does not exist
    /// * `Unavailable` - the store failed; nothing was written
    #[instrument(level = "debug", skip(self, description), fields(%amount))]
    pub async fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        self.post(Posting::deposit(account, amount, description))
            .await
            .map(|_| ())
    }

    /// Debit `amount` from an account if its balance covers it
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - the account does not exist
    /// * `InsufficientFunds` - the balance under lock is below `amount`
    /// * `Unavailable` - the store failed; nothing was written
    #[instrument(level = "debug", skip(self, description), fields(%amount))]
    pub async fn withdraw(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        self.post(Posting::withdrawal(account, amount, description))
            .await
            .map(|_| ())
    }

    /// Move `amount` from one account to another
    ///
    /// The caller has already checked that `from != to`.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - either account does not exist; no row is locked
    /// * `InsufficientFunds` - the source balance under lock is below `amount`
    /// * `Unavailable` - the store failed; nothing was written
    #[instrument(level = "debug", skip(self, description), fields(%amount))]
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        self.post(Posting::transfer(from, to, amount, description))
            .await
            .map(|_| ())
    }

    /// Apply a posting as one unit of work and return its transaction ID
    ///
    /// On any failure the unit of work is rolled back and no effect is
    /// observable.
    pub async fn post(&self, posting: Posting) -> Result<TransactionId, LedgerError> {
        let mut work = self.store.begin().await?;
        let mut phase = WorkPhase::Open;

        match self.apply(&mut work, &posting, &mut phase).await {
            Ok(transaction_id) => {
                if let Err(err) = work.commit().await {
                    error!(?phase, error = %err, "commit failed");
                    return Err(err);
                }
                debug!(transaction_id, phase = ?WorkPhase::Committed, "posting committed");
                Ok(transaction_id)
            }
            Err(err) => {
                if let Err(rollback_err) = work.rollback().await {
                    warn!(?phase, error = %rollback_err, "rollback failed");
                }
                match err.kind() {
                    ErrorKind::Unavailable => {
                        error!(failed_in = ?phase, phase = ?WorkPhase::RolledBack, error = %err, "posting failed")
                    }
                    _ => {
                        info!(failed_in = ?phase, phase = ?WorkPhase::RolledBack, error = %err, "posting rejected")
                    }
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        work: &mut S::Work,
        posting: &Posting,
        phase: &mut WorkPhase,
    ) -> Result<TransactionId, LedgerError> {
        let accounts = posting.accounts();

        for &account in &accounts {
            if !work.account_exists(account).await? {
                return Err(LedgerError::account_not_found(account));
            }
        }

        *phase = WorkPhase::Locking;
        let balances = lock_in_order(work, accounts).await?;

        *phase = WorkPhase::Checking;
        for (account, requested) in posting.debits() {
            let balance = balances
                .get(&account)
                .copied()
                .ok_or_else(|| LedgerError::account_not_found(account))?;
            if balance < requested {
                return Err(LedgerError::insufficient_funds(account, balance, requested));
            }
        }

        *phase = WorkPhase::Writing;
        let transaction_id = work
            .insert_transaction(self.clock.now(), posting.description())
            .await?;
        for leg in posting.legs() {
            work.insert_entry(NewLedgerEntry {
                transaction_id,
                account_id: leg.account,
                amount: leg.amount,
                is_credit: leg.side.is_credit(),
            })
            .await?;
        }
        for leg in posting.legs() {
            work.adjust_balance(leg.account, leg.signed_amount()).await?;
        }

        Ok(transaction_id)
    }
}
