//! PostgreSQL-backed ledger store
//!
//! Each `PgUnitOfWork` wraps one database transaction. Row locks are the
//! database's own: `lock_balance` issues `SELECT ... FOR UPDATE` on the
//! balances table, and the lock wait is bounded with `SET LOCAL lock_timeout`
//! so a stuck lock surfaces as `Unavailable` instead of hanging the caller.
//!
//! ## Error Mapping
//!
//! | PostgreSQL condition | Code    | LedgerError                       |
//! |----------------------|---------|-----------------------------------|
//! | lock not available   | `55P03` | `Unavailable` (lock timeout)      |
//! | any other error      | any     | `Unavailable` (driver message)    |
//!
//! Business errors (`AccountNotFound`, `InsufficientFunds`) are never produced
//! here; the engine derives them from what the store returns.
//!
//! The schema lives in `migrations/0001_wallet.sql` and is applied by
//! [`PgStore::migrate`].

use crate::core::traits::{LedgerStore, UnitOfWork};
use crate::store::StoreConfig;
use crate::types::{
    AccountId, AccountSummary, HistoryFilter, LedgerError, LedgerId, NewLedgerEntry,
    TransactionDetail, TransactionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, instrument};

const SCHEMA: &str = include_str!("../../migrations/0001_wallet.sql");

/// SQLSTATE raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Ledger store over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgStore {
    /// Connect to `database_url` and build a store over a fresh pool
    pub async fn connect(database_url: &str, config: StoreConfig) -> Result<Self, LedgerError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::from_pool(pool, config))
    }

    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Create the ledger tables if they do not exist
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    type Work = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters
        let lock_timeout = self.config.lock_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL lock_timeout = '{lock_timeout}ms'"))
            .execute(&mut *tx)
            .await?;

        Ok(PgUnitOfWork {
            tx,
            lock_timeout: self.config.lock_timeout,
        })
    }

    async fn account_exists(&self, account: AccountId) -> Result<bool, LedgerError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn balance(&self, account: AccountId) -> Result<Option<Decimal>, LedgerError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM balances WHERE account_id = $1")
                .bind(account)
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance)
    }

    async fn accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, b.balance
            FROM accounts a
            JOIN balances b ON b.account_id = a.id
            ORDER BY a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<AccountSummary, LedgerError> {
                Ok(AccountSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    balance: row.try_get("balance")?,
                })
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn history(
        &self,
        account: AccountId,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionDetail>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id AS transaction_id, t.transaction_date, t.description,
                   l.id AS ledger_id, l.account_id, l.amount, l.is_credit
            FROM ledger_entries l
            JOIN transactions t ON t.id = l.transaction_id
            WHERE l.account_id = $1
              AND ($2::date IS NULL OR (t.transaction_date AT TIME ZONE 'UTC')::date >= $2)
              AND ($3::date IS NULL OR (t.transaction_date AT TIME ZONE 'UTC')::date <= $3)
            ORDER BY t.transaction_date DESC, t.id DESC, l.id DESC
            "#,
        )
        .bind(account)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "history fetched");

        rows.iter()
            .map(|row| -> Result<TransactionDetail, LedgerError> {
                Ok(TransactionDetail {
                    transaction_id: row.try_get("transaction_id")?,
                    transaction_date: row.try_get("transaction_date")?,
                    description: row.try_get("description")?,
                    ledger_id: row.try_get("ledger_id")?,
                    account_id: row.try_get("account_id")?,
                    amount: row.try_get("amount")?,
                    is_credit: row.try_get("is_credit")?,
                })
            })
            .collect()
    }
}

/// One database transaction
///
/// Dropping it without committing rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    lock_timeout: Duration,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn account_exists(&mut self, account: AccountId) -> Result<bool, LedgerError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn lock_balance(&mut self, account: AccountId) -> Result<Option<Decimal>, LedgerError> {
        sqlx::query_scalar("SELECT balance FROM balances WHERE account_id = $1 FOR UPDATE")
            .bind(account)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|err| {
                let timed_out = err
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == LOCK_NOT_AVAILABLE);
                if timed_out {
                    LedgerError::lock_timeout(account, self.lock_timeout)
                } else {
                    err.into()
                }
            })
    }

    async fn insert_account(&mut self, name: &str) -> Result<AccountId, LedgerError> {
        let id: AccountId = sqlx::query_scalar("INSERT INTO accounts (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn insert_balance(
        &mut self,
        account: AccountId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO balances (account_id, balance) VALUES ($1, $2)")
            .bind(account)
            .bind(balance)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        timestamp: DateTime<Utc>,
        description: &str,
    ) -> Result<TransactionId, LedgerError> {
        let id: TransactionId = sqlx::query_scalar(
            "INSERT INTO transactions (transaction_date, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(timestamp)
        .bind(description)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerId, LedgerError> {
        let id: LedgerId = sqlx::query_scalar(
            r#"
            INSERT INTO ledger_entries (transaction_id, account_id, amount, is_credit)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(entry.transaction_id)
        .bind(entry.account_id)
        .bind(entry.amount)
        .bind(entry.is_credit)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn adjust_balance(
        &mut self,
        account: AccountId,
        delta: Decimal,
    ) -> Result<(), LedgerError> {
        let updated = sqlx::query("UPDATE balances SET balance = balance + $1 WHERE account_id = $2")
            .bind(delta)
            .bind(account)
            .execute(&mut *self.tx)
            .await?;

        if updated.rows_affected() != 1 {
            return Err(LedgerError::constraint_violation("balances.account_id"));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
