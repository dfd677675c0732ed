//! Defines the crate level error type and the conversion from SQLite errors.

use crate::user::UserID;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The username used to register a user is already taken.
    ///
    /// Usernames are compared case-sensitively, so "Carol" and "carol" are
    /// distinct users.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// The username or password did not satisfy the registration policy, or
    /// the username and password did not match a registered user.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Raw input from the user could not be parsed.
    ///
    /// The string explains which value was rejected and why, and is suitable
    /// for showing to the user.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transaction was created for a user that does not exist.
    #[error("the user ID {0} does not refer to a registered user")]
    InvalidUser(UserID),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An operation that acts on behalf of a user was attempted while nobody
    /// was logged in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The session file could not be read or written.
    #[error("could not access the session file: {0}")]
    SessionStorage(String),

    /// A data file or directory could not be created or accessed.
    #[error("could not access the data files: {0}")]
    Storage(String),

    /// Transactions could not be written as CSV.
    #[error("could not export transactions: {0}")]
    Export(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.ends_with("users.username") => Error::DuplicateUsername,
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        tracing::error!("the database lock was poisoned by a panicking thread");
        Error::DatabaseLockError
    }
}
