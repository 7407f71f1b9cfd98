//! Request layer
//!
//! `Ledger` is the entry point callers use: it validates requests, then hands
//! them to the `TransactionEngine` or the `AccountService`. Invalid requests
//! fail with `InvalidArgument` before any unit of work is opened.

use crate::core::account_service::AccountService;
use crate::core::engine::TransactionEngine;
use crate::core::traits::{Clock, LedgerStore, SystemClock};
use crate::core::validation::{
    parse_history_filter, validate_amount, validate_description, validate_transfer_endpoints,
};
use crate::types::{
    Account, AccountId, AccountSummary, Balance, LedgerError, Operation, TransactionHistory,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Validated access to the engine and the account service
pub struct Ledger<S: LedgerStore> {
    engine: TransactionEngine<S>,
    accounts: AccountService<S>,
}

impl<S: LedgerStore> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            accounts: self.accounts.clone(),
        }
    }
}

impl<S: LedgerStore> fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: TransactionEngine::with_clock(Arc::clone(&store), clock),
            accounts: AccountService::new(store),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.engine.store()
    }

    pub async fn create_account(&self, name: &str) -> Result<Account, LedgerError> {
        self.accounts.create_account(name).await
    }

    pub async fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        validate_amount(amount)?;
        validate_description(description)?;
        self.engine.deposit(account, amount, description).await
    }

    pub async fn withdraw(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        validate_amount(amount)?;
        validate_description(description)?;
        self.engine.withdraw(account, amount, description).await
    }

    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        validate_amount(amount)?;
        validate_transfer_endpoints(from, to)?;
        validate_description(description)?;
        self.engine.transfer(from, to, amount, description).await
    }

    pub async fn get_balance(&self, account: AccountId) -> Result<Balance, LedgerError> {
        self.accounts.get_balance(account).await
    }

    /// History of one account with optional `YYYY-MM-DD` bounds
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - a bound is not a valid date
    /// * `AccountNotFound` - the account does not exist
    pub async fn get_transaction_history(
        &self,
        account: AccountId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<TransactionHistory, LedgerError> {
        let filter = parse_history_filter(start_date, end_date)?;
        self.accounts.get_transaction_history(account, filter).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        self.accounts.list_accounts().await
    }

    /// Apply one replayed operation
    ///
    /// # Returns
    ///
    /// The ID of the created account for `Open`, `None` otherwise
    pub async fn apply(&self, operation: &Operation) -> Result<Option<AccountId>, LedgerError> {
        match operation {
            Operation::Open { name } => self.create_account(name).await.map(|account| Some(account.id)),
            Operation::Deposit {
                account,
                amount,
                description,
            } => self.deposit(*account, *amount, description).await.map(|_| None),
            Operation::Withdrawal {
                account,
                amount,
                description,
            } => self.withdraw(*account, *amount, description).await.map(|_| None),
            Operation::Transfer {
                from,
                to,
                amount,
                description,
            } => self
                .transfer(*from, *to, *amount, description)
                .await
                .map(|_| None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ErrorKind;
    use rstest::rstest;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(Arc::new(MemoryStore::new()))
    }

    #[rstest]
    #[case::zero_amount(Decimal::ZERO, "ok")]
    #[case::negative_amount(Decimal::from(-1), "ok")]
    #[case::empty_description(Decimal::ONE, "")]
    #[tokio::test]
    async fn test_invalid_deposit_never_reaches_store(
        #[case] amount: Decimal,
        #[case] description: &str,
    ) {
        let ledger = ledger();
        let account = ledger.create_account("Alice").await.unwrap();

        let err = ledger
            .deposit(account.id, amount, description)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(ledger.store().transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_existence_check() {
        let ledger = ledger();

        let err = ledger.withdraw(99, Decimal::ZERO, "x").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_self_transfer_is_invalid() {
        let ledger = ledger();
        let account = ledger.create_account("Alice").await.unwrap();

        let err = ledger
            .transfer(account.id, account.id, Decimal::ONE, "loop")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_history_with_bad_date() {
        let ledger = ledger();
        let account = ledger.create_account("Alice").await.unwrap();

        let err = ledger
            .get_transaction_history(account.id, Some("2024-13-01"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_apply_routes_every_operation() {
        let ledger = ledger();

        let alice = ledger
            .apply(&Operation::Open {
                name: "Alice".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        let bob = ledger
            .apply(&Operation::Open {
                name: "Bob".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let operations = [
            Operation::Deposit {
                account: alice,
                amount: Decimal::from(100),
                description: "salary".to_string(),
            },
            Operation::Withdrawal {
                account: alice,
                amount: Decimal::from(30),
                description: "rent".to_string(),
            },
            Operation::Transfer {
                from: alice,
                to: bob,
                amount: Decimal::from(20),
                description: "split".to_string(),
            },
        ];
        for operation in &operations {
            assert_eq!(ledger.apply(operation).await.unwrap(), None);
        }

        assert_eq!(
            ledger.get_balance(alice).await.unwrap().balance,
            Decimal::from(50)
        );
        assert_eq!(
            ledger.get_balance(bob).await.unwrap().balance,
            Decimal::from(20)
        );
    }
}
