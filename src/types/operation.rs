//! Validated request-layer operations
//!
//! An `Operation` is what the replay CLI hands to the ledger after the input
//! row passed validation. It carries everything the engine or the account
//! service needs for one call.

use super::account::AccountId;
use rust_decimal::Decimal;

/// Operation kinds understood by the request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Create an account; the row's description is the account name
    Open,
    Deposit,
    Withdrawal,
    Transfer,
}

/// A validated ledger operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Open {
        name: String,
    },
    Deposit {
        account: AccountId,
        amount: Decimal,
        description: String,
    },
    Withdrawal {
        account: AccountId,
        amount: Decimal,
        description: String,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: String,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Open { .. } => OperationKind::Open,
            Operation::Deposit { .. } => OperationKind::Deposit,
            Operation::Withdrawal { .. } => OperationKind::Withdrawal,
            Operation::Transfer { .. } => OperationKind::Transfer,
        }
    }

    /// Existing accounts whose balance rows this operation locks
    pub fn accounts(&self) -> Vec<AccountId> {
        match self {
            Operation::Open { .. } => Vec::new(),
            Operation::Deposit { account, .. } | Operation::Withdrawal { account, .. } => {
                vec![*account]
            }
            Operation::Transfer { from, to, .. } => vec![*from, *to],
        }
    }
}

/// An operation together with the input line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// 1-based line number in the input file (header is line 1)
    pub line: u64,
    pub operation: Operation,
}
