//! Writes transactions as CSV.

use std::io::Write;

use csv::Writer;
use serde::Serialize;

use crate::{Error, input::DATE_FORMAT, transaction::Transaction};

/// One CSV row. Field order sets the column order of the header.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    amount: f64,
    category: &'a str,
    date: String,
    description: &'a str,
}

impl<'a> ExportRow<'a> {
    fn from_transaction(transaction: &'a Transaction) -> Result<Self, Error> {
        let date = transaction
            .date
            .format(DATE_FORMAT)
            .map_err(|error| Error::Export(error.to_string()))?;

        Ok(Self {
            id: transaction.id,
            kind: transaction.kind.to_string(),
            amount: transaction.amount,
            category: &transaction.category,
            date,
            description: &transaction.description,
        })
    }
}

/// Write `transactions` to `writer` as CSV with the header
/// `id,type,amount,category,date,description`.
///
/// Rows are written in the order given. The header is written even when
/// there are no transactions.
///
/// # Errors
///
/// Returns [Error::Export] if a row cannot be formatted or written.
pub fn write_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<(), Error> {
    let mut csv_writer = Writer::from_writer(writer);

    if transactions.is_empty() {
        csv_writer
            .write_record(["id", "type", "amount", "category", "date", "description"])
            .map_err(|error| Error::Export(error.to_string()))?;
    }

    for transaction in transactions {
        let row = ExportRow::from_transaction(transaction)?;
        csv_writer
            .serialize(row)
            .map_err(|error| Error::Export(error.to_string()))?;
    }

    csv_writer
        .flush()
        .map_err(|error| Error::Export(error.to_string()))?;

    tracing::debug!("Exported {} transactions", transactions.len());

    Ok(())
}
