//! Defines the transaction model and the store that owns the sign convention
//! for income and expenses.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, session::Session, user::UserID};

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction earned or spent money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money earned. Stored with a non-negative amount.
    Income,
    /// Money spent. Stored with a non-positive amount.
    Expense,
}

impl TransactionKind {
    /// The integer code used for the kind in the database.
    pub fn code(&self) -> i64 {
        match self {
            TransactionKind::Income => 1,
            TransactionKind::Expense => 2,
        }
    }

    /// Get the kind for a database code, or `None` for an unknown code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransactionKind::Income),
            2 => Some(TransactionKind::Expense),
            _ => None,
        }
    }

    /// Coerce the sign of `amount` to match this kind.
    ///
    /// Income amounts become their absolute value and expense amounts become
    /// their negated absolute value. Zero is always returned as positive zero.
    pub fn normalize(&self, amount: f64) -> f64 {
        match self {
            TransactionKind::Income => amount.abs(),
            TransactionKind::Expense => 0.0 - amount.abs(),
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "Income"),
            TransactionKind::Expense => write!(f, "Expense"),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;

        TransactionKind::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether the transaction is income or an expense. Never changes after creation.
    pub kind: TransactionKind,
    /// The amount of money spent or earned in this transaction.
    ///
    /// Non-negative for income and non-positive for expenses.
    pub amount: f64,
    /// A free text label such as "Groceries" or "Salary".
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(kind: TransactionKind, amount: f64, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            amount,
            category: String::new(),
            date,
            description: String::new(),
        }
    }
}

/// A builder for the fields of a new [Transaction].
///
/// The sign of `amount` does not matter, the store coerces it to match `kind`.
///
/// # Examples
///
/// ```
/// use time::macros::date;
///
/// use budget_tracker::{Transaction, TransactionKind};
///
/// let builder = Transaction::build(TransactionKind::Expense, 4.5, date!(2024 - 03 - 20))
///     .category("Coffee")
///     .description("Flat white");
///
/// assert_eq!(builder.category, "Coffee");
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money, in any sign.
    pub amount: f64,
    /// A free text label. Defaults to the empty string.
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for. Defaults to the empty string.
    pub description: String,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the description for the transaction.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }
}

/// The new values for the mutable fields of a [Transaction].
///
/// The kind and owner of a transaction cannot be changed.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionUpdate {
    /// The new amount, in any sign. The store coerces it to match the kind.
    pub amount: f64,
    /// The new category.
    pub category: String,
    /// The new date.
    pub date: Date,
    /// The new description.
    pub description: String,
}

/// The order in which [TransactionStore::list_for_user] returns transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Newest first.
    #[default]
    DateDescending,
    /// Largest expense first, largest income last.
    AmountAscending,
}

// ============================================================================
// STORE
// ============================================================================

/// Handles the creation, modification and retrieval of transactions.
pub trait TransactionStore {
    /// Create a new transaction for `user_id` and return its ID.
    ///
    /// Implementers must store the amount with the sign given by the kind.
    fn add(&mut self, user_id: UserID, builder: TransactionBuilder)
    -> Result<TransactionId, Error>;

    /// Replace the mutable fields of the transaction `id`.
    ///
    /// Returns `false` if there is no transaction with that ID.
    fn update(&mut self, id: TransactionId, update: TransactionUpdate) -> Result<bool, Error>;

    /// Delete the transaction `id`, whoever owns it.
    ///
    /// Returns `false` if there is no transaction with that ID.
    fn delete(&mut self, id: TransactionId) -> Result<bool, Error>;

    /// Retrieve a transaction from the store.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error>;

    /// Retrieve all the transactions of `user_id` in the order `sort_by`.
    fn list_for_user(&self, user_id: UserID, sort_by: SortBy) -> Result<Vec<Transaction>, Error>;

    /// Get the number of transactions owned by `user_id`.
    fn count_for_user(&self, user_id: UserID) -> Result<usize, Error>;

    /// Retrieve the transaction `id` if it belongs to the user of `session`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no transaction `id` or another
    /// user owns it.
    fn get_owned(&self, session: Session, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = self.get(id)?;

        if transaction.user_id != session.user_id() {
            return Err(Error::NotFound);
        }

        Ok(transaction)
    }
}

/// Stores transactions in a SQLite database.
///
/// Note that because a transaction depends on the [User](crate::User) model,
/// the user table must be set up in the database.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

const SELECT_BY_USER_DATE_DESC: &str = "SELECT id, user_id, type, amount, category, date, description
     FROM transactions WHERE user_id = :user_id
     ORDER BY date DESC, id DESC";

const SELECT_BY_USER_AMOUNT_ASC: &str = "SELECT id, user_id, type, amount, category, date, description
     FROM transactions WHERE user_id = :user_id
     ORDER BY amount ASC, id ASC";

impl TransactionStore for SQLiteTransactionStore {
    /// Create a new transaction in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidUser] if `user_id` does not refer to a registered user,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn add(
        &mut self,
        user_id: UserID,
        builder: TransactionBuilder,
    ) -> Result<TransactionId, Error> {
        let amount = builder.kind.normalize(builder.amount);

        let id = self
            .connection
            .lock()?
            .prepare(
                "INSERT INTO transactions (user_id, type, amount, category, date, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
            )?
            .query_row(
                (
                    user_id.as_i64(),
                    builder.kind,
                    amount,
                    &builder.category,
                    builder.date,
                    &builder.description,
                ),
                |row| row.get(0),
            )
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                    },
                    _,
                ) => Error::InvalidUser(user_id),
                error => error.into(),
            })?;

        tracing::debug!(
            "Added transaction {id}: user={user_id}, type={}, amount={amount}, date={}",
            builder.kind,
            builder.date
        );

        Ok(id)
    }

    /// Update the amount, category, date and description of a transaction.
    ///
    /// The amount is coerced to the sign of the stored kind within the same
    /// statement, so an update can never break the sign convention.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL error.
    fn update(&mut self, id: TransactionId, update: TransactionUpdate) -> Result<bool, Error> {
        let rows_affected = self.connection.lock()?.execute(
            "UPDATE transactions SET
                amount = CASE type WHEN ?1 THEN abs(?2) ELSE 0.0 - abs(?2) END,
                category = ?3,
                date = ?4,
                description = ?5
             WHERE id = ?6",
            (
                TransactionKind::Income,
                update.amount,
                &update.category,
                update.date,
                &update.description,
                id,
            ),
        )?;

        if rows_affected > 0 {
            tracing::debug!("Updated transaction {id}");
        }

        Ok(rows_affected > 0)
    }

    /// Delete a transaction from the database.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL error.
    fn delete(&mut self, id: TransactionId) -> Result<bool, Error> {
        let rows_affected = self
            .connection
            .lock()?
            .execute("DELETE FROM transactions WHERE id = ?1", (id,))?;

        if rows_affected > 0 {
            tracing::debug!("Deleted transaction {id}");
        }

        Ok(rows_affected > 0)
    }

    /// Retrieve a transaction in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid transaction,
    /// - or [Error::SqlError] there is some other SQL error.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = self
            .connection
            .lock()?
            .prepare(
                "SELECT id, user_id, type, amount, category, date, description
                 FROM transactions WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], map_transaction_row)?;

        Ok(transaction)
    }

    /// Retrieve the transactions of a user.
    ///
    /// All rows are collected before the database lock is released.
    ///
    /// # Errors
    /// This function will return a [Error::SqlError] there is a SQL error.
    fn list_for_user(&self, user_id: UserID, sort_by: SortBy) -> Result<Vec<Transaction>, Error> {
        let query = match sort_by {
            SortBy::DateDescending => SELECT_BY_USER_DATE_DESC,
            SortBy::AmountAscending => SELECT_BY_USER_AMOUNT_ASC,
        };

        self.connection
            .lock()?
            .prepare(query)?
            .query_map(&[(":user_id", &user_id.as_i64())], map_transaction_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    fn count_for_user(&self, user_id: UserID) -> Result<usize, Error> {
        self.connection
            .lock()?
            .query_row(
                "SELECT COUNT(id) FROM transactions WHERE user_id = ?1",
                (user_id.as_i64(),),
                |row| row.get::<_, u32>(0).map(|count| count as usize),
            )
            .map_err(|error| error.into())
    }
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                type INTEGER NOT NULL CHECK (type IN (1, 2)),
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_id ON transactions(user_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = UserID::new(row.get(1)?);
    let kind = row.get(2)?;
    let amount = row.get(3)?;
    let category = row.get(4)?;
    let date = row.get(5)?;
    let description = row.get(6)?;

    Ok(Transaction {
        id,
        user_id,
        kind,
        amount,
        category,
        date,
        description,
    })
}

// ============================================================================
// TESTS
// ============================================================================
