//! CSV format handling
//!
//! This module defines the operation input format and the output writers.
//!
//! # Input format
//!
//! ```csv
//! type,account,counterparty,amount,description
//! open,,,,Alice
//! deposit,1,,100.00,salary
//! withdrawal,1,,30.00,rent
//! transfer,1,2,70.00,split
//! ```
//!
//! - `type` is case-insensitive
//! - `open` takes the account name from `description` and ignores the rest
//! - `transfer` moves money from `account` to `counterparty`
//!
//! # Output formats
//!
//! Accounts: `account,name,balance`, ordered by account ID.
//! History: one row per ledger entry, newest first.

use crate::types::{
    AccountId, AccountSummary, LedgerError, Operation, ReplayError, TransactionHistory,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Raw operation row as read from CSV
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub account: Option<AccountId>,
    pub counterparty: Option<AccountId>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

/// Convert a raw CSV row into an `Operation`
///
/// Only the row's shape is checked here: known type, required columns
/// present, amount parses as a decimal. Business validation (positive
/// amount, description length, distinct transfer endpoints) is left to the
/// ledger so those rejections are counted like any other.
///
/// # Errors
///
/// `InvalidArgument` naming the first problem found
pub fn convert_csv_operation(row: CsvOperation) -> Result<Operation, LedgerError> {
    let description = row.description.unwrap_or_default();

    match row.op_type.to_lowercase().as_str() {
        "open" => Ok(Operation::Open { name: description }),
        "deposit" => Ok(Operation::Deposit {
            account: required("account", row.account)?,
            amount: parse_amount(row.amount)?,
            description,
        }),
        "withdrawal" => Ok(Operation::Withdrawal {
            account: required("account", row.account)?,
            amount: parse_amount(row.amount)?,
            description,
        }),
        "transfer" => Ok(Operation::Transfer {
            from: required("account", row.account)?,
            to: required("counterparty", row.counterparty)?,
            amount: parse_amount(row.amount)?,
            description,
        }),
        _ => Err(LedgerError::invalid_argument(format!(
            "unknown operation type '{}'",
            row.op_type
        ))),
    }
}

fn required(column: &str, value: Option<AccountId>) -> Result<AccountId, LedgerError> {
    value.ok_or_else(|| LedgerError::invalid_argument(format!("missing {column}")))
}

fn parse_amount(raw: Option<String>) -> Result<Decimal, LedgerError> {
    match raw {
        Some(amount) if !amount.trim().is_empty() => Decimal::from_str(amount.trim())
            .map_err(|_| LedgerError::invalid_argument(format!("invalid amount '{amount}'"))),
        _ => Err(LedgerError::invalid_argument("missing amount")),
    }
}

/// Write account balances as CSV, ordered by account ID
pub fn write_accounts_csv(
    accounts: &[AccountSummary],
    output: &mut dyn Write,
) -> Result<(), ReplayError> {
    let mut writer = csv::Writer::from_writer(output);

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    if sorted_accounts.is_empty() {
        writer.write_record(["account", "name", "balance"])?;
    }
    for account in &sorted_accounts {
        writer.serialize(account)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write one account's history as CSV in the order given
pub fn write_history_csv(
    history: &TransactionHistory,
    output: &mut dyn Write,
) -> Result<(), ReplayError> {
    let mut writer = csv::Writer::from_writer(output);

    if history.transactions.is_empty() {
        writer.write_record([
            "transaction_id",
            "transaction_date",
            "description",
            "ledger_id",
            "account_id",
            "amount",
            "is_credit",
        ])?;
    }
    for entry in &history.transactions {
        writer.serialize(entry)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, TransactionDetail};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn row(
        op_type: &str,
        account: Option<AccountId>,
        counterparty: Option<AccountId>,
        amount: Option<&str>,
        description: Option<&str>,
    ) -> CsvOperation {
        CsvOperation {
            op_type: op_type.to_string(),
            account,
            counterparty,
            amount: amount.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    #[rstest]
    #[case::deposit("deposit")]
    #[case::upper_case("DEPOSIT")]
    #[case::mixed_case("Deposit")]
    fn test_deposit_type_is_case_insensitive(#[case] op_type: &str) {
        let operation =
            convert_csv_operation(row(op_type, Some(1), None, Some("100.50"), Some("salary")))
                .unwrap();

        assert_eq!(
            operation,
            Operation::Deposit {
                account: 1,
                amount: Decimal::new(10050, 2),
                description: "salary".to_string(),
            }
        );
    }

    #[test]
    fn test_open_takes_name_from_description() {
        let operation = convert_csv_operation(row("open", None, None, None, Some("Alice"))).unwrap();
        assert_eq!(
            operation,
            Operation::Open {
                name: "Alice".to_string()
            }
        );
    }

    #[test]
    fn test_transfer_uses_counterparty_as_destination() {
        let operation =
            convert_csv_operation(row("transfer", Some(1), Some(2), Some("70"), Some("split")))
                .unwrap();
        assert_eq!(
            operation,
            Operation::Transfer {
                from: 1,
                to: 2,
                amount: Decimal::from(70),
                description: "split".to_string(),
            }
        );
    }

    #[rstest]
    #[case::unknown_type(row("refund", Some(1), None, Some("1"), Some("x")), "unknown operation type 'refund'")]
    #[case::missing_account(row("deposit", None, None, Some("1"), Some("x")), "missing account")]
    #[case::missing_counterparty(row("transfer", Some(1), None, Some("1"), Some("x")), "missing counterparty")]
    #[case::missing_amount(row("withdrawal", Some(1), None, Some("  "), Some("x")), "missing amount")]
    #[case::bad_amount(row("deposit", Some(1), None, Some("ten"), Some("x")), "invalid amount 'ten'")]
    fn test_malformed_rows(#[case] input: CsvOperation, #[case] message: &str) {
        let err = convert_csv_operation(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().ends_with(message), "{err}");
    }

    #[test]
    fn test_negative_amount_is_left_to_the_ledger() {
        let operation =
            convert_csv_operation(row("deposit", Some(1), None, Some("-5"), Some("x"))).unwrap();
        assert!(matches!(operation, Operation::Deposit { amount, .. } if amount.is_sign_negative()));
    }

    #[test]
    fn test_write_accounts_csv_sorted_by_id() {
        let accounts = vec![
            AccountSummary {
                id: 2,
                name: "Bob".to_string(),
                balance: Decimal::new(7000, 2),
            },
            AccountSummary {
                id: 1,
                name: "Alice".to_string(),
                balance: Decimal::ZERO,
            },
        ];
        let mut output = Vec::new();

        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,name,balance\n1,Alice,0\n2,Bob,70.00\n"
        );
    }

    #[test]
    fn test_write_accounts_csv_empty_has_header() {
        let mut output = Vec::new();
        write_accounts_csv(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "account,name,balance\n");
    }

    #[test]
    fn test_write_history_csv() {
        let history = TransactionHistory {
            account_id: 1,
            start_date: None,
            end_date: None,
            transactions: vec![TransactionDetail {
                transaction_id: 3,
                transaction_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                description: "rent".to_string(),
                ledger_id: 4,
                account_id: 1,
                amount: Decimal::new(3000, 2),
                is_credit: false,
            }],
        };
        let mut output = Vec::new();

        write_history_csv(&history, &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("transaction_id,transaction_date,description,ledger_id,account_id,amount,is_credit")
        );
        assert_eq!(lines.next(), Some("3,2024-03-01T12:00:00Z,rent,4,1,30.00,false"));
        assert_eq!(lines.next(), None);
    }
}
