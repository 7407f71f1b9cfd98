//! Request validation
//!
//! Every check here runs before a unit of work is opened, so a rejected
//! request never touches the store. All failures are `InvalidArgument`.

use crate::types::{AccountId, HistoryFilter, LedgerError};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Longest description a transaction may carry, in characters
pub const MAX_DESCRIPTION_LEN: usize = 100;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_argument(
            "amount must be greater than zero",
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), LedgerError> {
    if description.trim().is_empty() {
        return Err(LedgerError::invalid_argument("description is required"));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(LedgerError::invalid_argument(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_transfer_endpoints(from: AccountId, to: AccountId) -> Result<(), LedgerError> {
    if from == to {
        return Err(LedgerError::invalid_argument(
            "cannot transfer to the same account",
        ));
    }
    Ok(())
}

pub fn validate_account_name(name: &str) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::invalid_argument("account name is required"));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date
///
/// # Arguments
///
/// * `field` - Name of the parameter, used in the error message
/// * `value` - Raw input
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, LedgerError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        LedgerError::invalid_argument(format!(
            "invalid {field} '{value}', expected YYYY-MM-DD"
        ))
    })
}

/// Build a history filter from optional raw date bounds
pub fn parse_history_filter(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<HistoryFilter, LedgerError> {
    let start_date = start_date
        .map(|value| parse_date("start_date", value))
        .transpose()?;
    let end_date = end_date
        .map(|value| parse_date("end_date", value))
        .transpose()?;
    Ok(HistoryFilter::new(start_date, end_date))
}
