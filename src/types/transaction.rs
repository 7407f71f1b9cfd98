//! Transaction-related types for the wallet ledger
//!
//! This module defines the immutable ledger records (transactions and their
//! entries), the history rows returned to callers, and the `Posting` that the
//! engine turns into one atomic unit of work.

use super::account::AccountId;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Transaction identifier, assigned by the store
pub type TransactionId = i64;

/// Ledger entry identifier, assigned by the store
pub type LedgerId = i64;

/// Direction of a ledger entry relative to its account
///
/// A credit moves money into the account, a debit moves money out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntrySide {
    Credit,
    Debit,
}

impl EntrySide {
    pub fn is_credit(self) -> bool {
        matches!(self, EntrySide::Credit)
    }

    pub fn from_is_credit(is_credit: bool) -> Self {
        if is_credit {
            EntrySide::Credit
        } else {
            EntrySide::Debit
        }
    }

    /// Apply the side's sign to a positive amount
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            EntrySide::Credit => amount,
            EntrySide::Debit => -amount,
        }
    }
}

/// One economic event (deposit, withdrawal, or transfer)
///
/// Never updated or deleted once committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// One debit or credit line of a transaction against a single account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: LedgerId,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,

    /// Always strictly positive; the direction lives in `is_credit`
    pub amount: Decimal,
    pub is_credit: bool,
}

/// Ledger entry as handed to the store, before it has an ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub is_credit: bool,
}

/// A ledger entry joined with its transaction
///
/// This is the row shape of an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    pub transaction_id: TransactionId,
    pub transaction_date: DateTime<Utc>,
    pub description: String,
    pub ledger_id: LedgerId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub is_credit: bool,
}

impl TransactionDetail {
    pub fn side(&self) -> EntrySide {
        EntrySide::from_is_credit(self.is_credit)
    }

    /// Amount with its effect on the account balance applied
    pub fn signed_amount(&self) -> Decimal {
        self.side().signed(self.amount)
    }
}

/// Optional calendar-date bounds for a history query
///
/// Both bounds are inclusive and compared against the UTC date of the
/// transaction timestamp, not the timestamp itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        HistoryFilter {
            start_date,
            end_date,
        }
    }

    /// A filter that keeps every entry
    pub fn all() -> Self {
        HistoryFilter::default()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// History of one account, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionHistory {
    pub account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub transactions: Vec<TransactionDetail>,
}

/// One leg of a posting: an amount moved into or out of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub account: AccountId,
    pub amount: Decimal,
    pub side: EntrySide,
}

impl Leg {
    pub fn credit(account: AccountId, amount: Decimal) -> Self {
        Leg {
            account,
            amount,
            side: EntrySide::Credit,
        }
    }

    pub fn debit(account: AccountId, amount: Decimal) -> Self {
        Leg {
            account,
            amount,
            side: EntrySide::Debit,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.side.signed(self.amount)
    }
}

/// A balance-affecting event, ready to be applied by the engine
///
/// Postings can only be built through the constructors below, so a transfer
/// always carries exactly two legs with equal amounts and opposite sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    description: String,
    legs: Vec<Leg>,
}

impl Posting {
    pub fn deposit(account: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Posting {
            description: description.into(),
            legs: vec![Leg::credit(account, amount)],
        }
    }

    pub fn withdrawal(account: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Posting {
            description: description.into(),
            legs: vec![Leg::debit(account, amount)],
        }
    }

    pub fn transfer(
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Posting {
            description: description.into(),
            legs: vec![Leg::debit(from, amount), Leg::credit(to, amount)],
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Distinct accounts touched by this posting, in ascending ID order
    ///
    /// This is the canonical lock acquisition order.
    pub fn accounts(&self) -> BTreeSet<AccountId> {
        self.legs.iter().map(|leg| leg.account).collect()
    }

    /// Total amount debited from each account
    pub fn debits(&self) -> BTreeMap<AccountId, Decimal> {
        let mut debits = BTreeMap::new();
        for leg in self.legs.iter().filter(|leg| leg.side == EntrySide::Debit) {
            let total: &mut Decimal = debits.entry(leg.account).or_default();
            *total = total.saturating_add(leg.amount);
        }
        debits
    }
}
