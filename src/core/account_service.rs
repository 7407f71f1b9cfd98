//! Account service
//!
//! This module provides the `AccountService`, which owns account creation and
//! the read paths: balance lookup, transaction history, and account listing.
//!
//! # Reads
//!
//! Reads go straight to the store's committed state. They take no row locks,
//! so a balance read may be momentarily stale relative to an in-flight
//! transfer but never observes half of one.

use crate::core::traits::{LedgerStore, UnitOfWork};
use crate::core::validation::validate_account_name;
use crate::types::{
    Account, AccountId, AccountSummary, Balance, HistoryFilter, LedgerError, TransactionHistory,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Account lifecycle and read operations over a `LedgerStore`
pub struct AccountService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> fmt::Debug for AccountService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

impl<S: LedgerStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create an account with a zero balance
    ///
    /// The account row and its balance row are written in one unit of work,
    /// so an account never exists without a balance.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name, must not be blank
    ///
    /// # Returns
    ///
    /// The created account with its store-assigned ID
    #[instrument(level = "debug", skip(self))]
    pub async fn create_account(&self, name: &str) -> Result<Account, LedgerError> {
        validate_account_name(name)?;

        let mut work = self.store.begin().await?;
        match Self::insert_zeroed(&mut work, name).await {
            Ok(id) => {
                work.commit().await?;
                debug!(account = id, "account created");
                Ok(Account::new(id, name))
            }
            Err(err) => {
                if let Err(rollback_err) = work.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn insert_zeroed(work: &mut S::Work, name: &str) -> Result<AccountId, LedgerError> {
        let id = work.insert_account(name).await?;
        work.insert_balance(id, Decimal::ZERO).await?;
        Ok(id)
    }

    /// Committed balance of an account
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - the account does not exist
    pub async fn get_balance(&self, account: AccountId) -> Result<Balance, LedgerError> {
        let balance = self
            .store
            .balance(account)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account))?;

        Ok(Balance {
            account_id: account,
            balance,
        })
    }

    /// Ledger entries of one account, newest first
    ///
    /// Both filter bounds are inclusive calendar dates in UTC.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - the account does not exist. An existing account
    ///   with no entries yields an empty history instead.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_transaction_history(
        &self,
        account: AccountId,
        filter: HistoryFilter,
    ) -> Result<TransactionHistory, LedgerError> {
        if !self.store.account_exists(account).await? {
            return Err(LedgerError::account_not_found(account));
        }

        let transactions = self.store.history(account, &filter).await?;

        Ok(TransactionHistory {
            account_id: account,
            start_date: filter.start_date,
            end_date: filter.end_date,
            transactions,
        })
    }

    /// Every account with its balance, ordered by ID
    pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        self.store.accounts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::TransactionEngine;
    use crate::store::MemoryStore;
    use crate::types::ErrorKind;
    use chrono::NaiveDate;

    fn service() -> (Arc<MemoryStore>, AccountService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), AccountService::new(store))
    }

    #[tokio::test]
    async fn test_create_account_starts_at_zero() {
        let (_, service) = service();

        let alice = service.create_account("Alice").await.unwrap();
        let bob = service.create_account("Bob").await.unwrap();

        assert_eq!(alice.name, "Alice");
        assert!(bob.id > alice.id);
        assert_eq!(
            service.get_balance(alice.id).await.unwrap(),
            Balance {
                account_id: alice.id,
                balance: Decimal::ZERO
            }
        );
    }

    #[tokio::test]
    async fn test_create_account_rejects_blank_name() {
        let (store, service) = service();

        let err = service.create_account("  ").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(store.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_balance_of_missing_account() {
        let (_, service) = service();
        assert_eq!(
            service.get_balance(7).await.unwrap_err(),
            LedgerError::account_not_found(7)
        );
    }

    #[tokio::test]
    async fn test_history_of_missing_account_is_not_found() {
        let (_, service) = service();
        let err = service
            .get_transaction_history(7, HistoryFilter::all())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_history_of_new_account_is_empty() {
        let (_, service) = service();
        let alice = service.create_account("Alice").await.unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 1, 1);
        let history = service
            .get_transaction_history(alice.id, HistoryFilter::new(start, None))
            .await
            .unwrap();

        assert_eq!(history.account_id, alice.id);
        assert_eq!(history.start_date, start);
        assert!(history.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_list_accounts_reflects_committed_balances() {
        let (store, service) = service();
        let engine = TransactionEngine::new(Arc::clone(&store));
        let alice = service.create_account("Alice").await.unwrap();
        let bob = service.create_account("Bob").await.unwrap();

        engine.deposit(bob.id, Decimal::from(5), "gift").await.unwrap();

        let accounts = service.list_accounts().await.unwrap();
        assert_eq!(
            accounts,
            vec![
                AccountSummary {
                    id: alice.id,
                    name: "Alice".to_string(),
                    balance: Decimal::ZERO
                },
                AccountSummary {
                    id: bob.id,
                    name: "Bob".to_string(),
                    balance: Decimal::from(5)
                },
            ]
        );
    }
}
