//! Parsing of raw user input into the types the stores expect.
//!
//! The stores trust their inputs, so front ends should run everything they
//! read from the user through these functions first.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, transaction::TransactionKind};

/// The only accepted date format, e.g. "2024-03-05".
pub const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parse a decimal amount such as "12.50" or "-3".
///
/// Surrounding whitespace is ignored. The sign is kept; the store decides
/// the final sign from the transaction kind.
///
/// # Errors
///
/// Returns [Error::InvalidInput] if `raw` is empty, not a number, or not finite.
pub fn parse_amount(raw: &str) -> Result<f64, Error> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidInput("the amount cannot be empty".to_owned()));
    }

    match trimmed.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(Error::InvalidInput(format!(
            "\"{trimmed}\" is not a valid amount"
        ))),
    }
}

/// Parse a calendar date in the form "YYYY-MM-DD".
///
/// # Errors
///
/// Returns [Error::InvalidInput] if `raw` does not have exactly that shape or
/// names a day that does not exist, such as "2024-02-30".
pub fn parse_date(raw: &str) -> Result<Date, Error> {
    let trimmed = raw.trim();
    let invalid = || {
        Error::InvalidInput(format!(
            "\"{trimmed}\" is not a valid date, use the format YYYY-MM-DD"
        ))
    };

    if !has_date_shape(trimmed) {
        return Err(invalid());
    }

    Date::parse(trimmed, DATE_FORMAT).map_err(|_| invalid())
}

fn has_date_shape(text: &str) -> bool {
    let bytes = text.as_bytes();

    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, byte)| match i {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Parse "income" or "expense", ignoring case and surrounding whitespace.
///
/// # Errors
///
/// Returns [Error::InvalidInput] for any other string.
pub fn parse_kind(raw: &str) -> Result<TransactionKind, Error> {
    match raw.trim().to_lowercase().as_str() {
        "income" => Ok(TransactionKind::Income),
        "expense" => Ok(TransactionKind::Expense),
        other => Err(Error::InvalidInput(format!(
            "\"{other}\" is not a transaction type, use \"income\" or \"expense\""
        ))),
    }
}

/// Trim `raw` and reject it if nothing is left.
///
/// `field` names the value in the error message.
///
/// # Errors
///
/// Returns [Error::InvalidInput] if `raw` is empty or only whitespace.
pub fn require_non_empty(field: &str, raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        Err(Error::InvalidInput(format!("the {field} cannot be empty")))
    } else {
        Ok(trimmed.to_owned())
    }
}



#[cfg(test)]
mod parse_kind_tests {
    use crate::{Error, transaction::TransactionKind};

    use super::{parse_kind, require_non_empty};

    #[test]
    fn parses_kinds() {
        assert_eq!(parse_kind("income"), Ok(TransactionKind::Income));
        assert_eq!(parse_kind(" Expense "), Ok(TransactionKind::Expense));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(matches!(parse_kind("transfer"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn require_non_empty_trims() {
        assert_eq!(require_non_empty("category", "  Food "), Ok("Food".to_owned()));
        assert_eq!(
            require_non_empty("category", "   "),
            Err(Error::InvalidInput("the category cannot be empty".to_owned()))
        );
    }
}
