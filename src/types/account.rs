//! Account-related types for the wallet ledger
//!
//! This module defines the Account identity, its derived balance snapshot, and
//! the summary row used when listing every account in the store.

use rust_decimal::Decimal;
use serde::Serialize;

/// Account identifier
///
/// Opaque signed 64-bit identity assigned by the store when the account is
/// created. Lock ordering compares these numerically.
pub type AccountId = i64;

/// Account identity
///
/// Created once together with a zero balance and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Store-assigned account ID
    #[serde(rename = "account_id")]
    pub id: AccountId,

    /// Display name given at creation
    #[serde(rename = "account_name")]
    pub name: String,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Account {
            id,
            name: name.into(),
        }
    }
}

/// Current balance of one account
///
/// A plain read of the balance row; it reflects every committed unit of work
/// and never waits on row locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub account_id: AccountId,
    pub balance: Decimal,
}

/// Account identity joined with its current balance
///
/// Produced by `ListAccounts` and written as the replay output rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    #[serde(rename = "account")]
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
}
