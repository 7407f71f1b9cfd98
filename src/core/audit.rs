//! Ledger invariant check
//!
//! Recomputes every balance from the ledger entries and compares it with the
//! stored balance, and checks that every transaction has one of the shapes the
//! engine produces:
//!
//! - one entry (a deposit credit or a withdrawal debit)
//! - two entries of equal amount on different accounts, one credit and one
//!   debit (a transfer)
//!
//! The audit reads committed state only. Run it while no postings are in
//! flight, otherwise a commit landing between two reads shows up as a false
//! mismatch.

use crate::core::traits::LedgerStore;
use crate::types::{AccountId, HistoryFilter, LedgerError, TransactionDetail, TransactionId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Stored balance that disagrees with the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub stored: Decimal,
    pub derived: Decimal,
}

/// Findings of one audit run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub accounts_checked: usize,
    pub transactions_checked: usize,
    pub balance_mismatches: Vec<BalanceMismatch>,
    pub malformed_transactions: Vec<TransactionId>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.balance_mismatches.is_empty() && self.malformed_transactions.is_empty()
    }

    /// Total number of findings
    pub fn issue_count(&self) -> usize {
        self.balance_mismatches.len() + self.malformed_transactions.len()
    }
}

/// Check the balance invariant and the entry shape of every transaction
#[instrument(level = "debug", skip(store))]
pub async fn audit<S: LedgerStore>(store: &S) -> Result<AuditReport, LedgerError> {
    let mut report = AuditReport::default();
    let mut by_transaction: BTreeMap<TransactionId, Vec<TransactionDetail>> = BTreeMap::new();

    for account in store.accounts().await? {
        let entries = store.history(account.id, &HistoryFilter::all()).await?;
        let derived: Decimal = entries.iter().map(TransactionDetail::signed_amount).sum();

        if derived != account.balance {
            warn!(account = account.id, stored = %account.balance, %derived, "balance mismatch");
            report.balance_mismatches.push(BalanceMismatch {
                account_id: account.id,
                stored: account.balance,
                derived,
            });
        }

        for entry in entries {
            by_transaction
                .entry(entry.transaction_id)
                .or_default()
                .push(entry);
        }
        report.accounts_checked += 1;
    }

    report.transactions_checked = by_transaction.len();
    for (transaction_id, entries) in &by_transaction {
        if !is_well_formed(entries) {
            warn!(transaction_id, entries = entries.len(), "malformed transaction");
            report.malformed_transactions.push(*transaction_id);
        }
    }

    info!(
        accounts = report.accounts_checked,
        transactions = report.transactions_checked,
        issues = report.issue_count(),
        "audit finished"
    );
    Ok(report)
}

fn is_well_formed(entries: &[TransactionDetail]) -> bool {
    match entries {
        [_single] => true,
        [a, b] => a.is_credit != b.is_credit && a.amount == b.amount && a.account_id != b.account_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::TransactionEngine;
    use crate::core::traits::UnitOfWork;
    use crate::store::MemoryStore;
    use crate::types::NewLedgerEntry;
    use chrono::Utc;
    use std::sync::Arc;

    async fn open(store: &MemoryStore, balance: Decimal) -> AccountId {
        let mut work = store.begin().await.unwrap();
        let id = work.insert_account("holder").await.unwrap();
        work.insert_balance(id, balance).await.unwrap();
        work.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_engine_postings_audit_clean() {
        let store = Arc::new(MemoryStore::new());
        let engine = TransactionEngine::new(Arc::clone(&store));
        let a = open(&store, Decimal::ZERO).await;
        let b = open(&store, Decimal::ZERO).await;

        engine.deposit(a, Decimal::from(100), "in").await.unwrap();
        engine.transfer(a, b, Decimal::from(40), "move").await.unwrap();
        engine.withdraw(b, Decimal::from(15), "out").await.unwrap();

        let report = audit(store.as_ref()).await.unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.transactions_checked, 3);
    }

    #[tokio::test]
    async fn test_balance_without_entries_is_a_mismatch() {
        let store = MemoryStore::new();
        let id = open(&store, Decimal::from(10)).await;

        let report = audit(&store).await.unwrap();

        assert_eq!(
            report.balance_mismatches,
            vec![BalanceMismatch {
                account_id: id,
                stored: Decimal::from(10),
                derived: Decimal::ZERO,
            }]
        );
        assert_eq!(report.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_one_sided_transfer_is_malformed() {
        let store = MemoryStore::new();
        let a = open(&store, Decimal::ZERO).await;
        let b = open(&store, Decimal::ZERO).await;

        let mut work = store.begin().await.unwrap();
        work.lock_balance(a).await.unwrap();
        work.lock_balance(b).await.unwrap();
        let tx = work.insert_transaction(Utc::now(), "skewed").await.unwrap();
        for (account_id, amount) in [(a, Decimal::from(5)), (b, Decimal::from(6))] {
            work.insert_entry(NewLedgerEntry {
                transaction_id: tx,
                account_id,
                amount,
                is_credit: true,
            })
            .await
            .unwrap();
            work.adjust_balance(account_id, amount).await.unwrap();
        }
        work.commit().await.unwrap();

        let report = audit(&store).await.unwrap();

        assert!(report.balance_mismatches.is_empty());
        assert_eq!(report.malformed_transactions, vec![tx]);
    }
}
