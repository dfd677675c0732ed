//! Sets up the application database.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, transaction::create_transaction_table, user::create_user_table};

/// Create the tables for the domain models if they do not exist yet.
///
/// Also turns on foreign key enforcement for `connection`, which SQLite
/// leaves off by default.
///
/// # Errors
///
/// Returns an [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Open the database file at `path`, creating it if needed, and initialize it.
///
/// The returned connection can be shared between the stores.
///
/// # Errors
///
/// Returns an [Error::SqlError] if the file could not be opened or initialized.
pub fn open(path: &Path) -> Result<Arc<Mutex<Connection>>, Error> {
    let connection = Connection::open(path)?;
    initialize(&connection)?;

    tracing::debug!("Opened database at {path:?}");

    Ok(Arc::new(Mutex::new(connection)))
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn creates_tables_and_index() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let mut names: Vec<String> = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect();
        names.sort();

        assert_eq!(names, vec!["idx_user_id", "transactions", "users"]);
    }

    #[test]
    fn is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        assert_eq!(initialize(&conn), Ok(()));
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let enabled: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
