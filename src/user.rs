//! The user directory: registering users, checking credentials and looking up
//! users by username.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    password::{PasswordHash, ValidatedPassword},
    session::{Session, SessionStore},
};

/// The minimum number of characters in a username.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Whether `username` is long enough to register, counted in characters.
pub fn is_valid_username(username: &str) -> bool {
    username.chars().count() >= MIN_USERNAME_LENGTH
}

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with. Unique across all users.
    pub username: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Handles the registration of users and the checking of their credentials.
pub trait UserStore {
    /// Register a new user and return their ID.
    ///
    /// Implementers must reject usernames shorter than [MIN_USERNAME_LENGTH]
    /// and passwords that fail the [ValidatedPassword] policy with
    /// [Error::InvalidCredentials], and taken usernames with
    /// [Error::DuplicateUsername].
    fn register(&mut self, username: &str, password: &str) -> Result<UserID, Error>;

    /// Get the ID of the user with exactly `username` and `password`, or
    /// `None` if no such user exists.
    fn verify(&self, username: &str, password: &str) -> Result<Option<UserID>, Error>;

    /// Whether a user with `username` exists, regardless of password.
    fn exists(&self, username: &str) -> Result<bool, Error>;

    /// Get a user by their ID.
    fn get(&self, id: UserID) -> Result<User, Error>;

    /// Get the number of registered users.
    fn count(&self) -> Result<usize, Error>;

    /// Replace the password of the user `id`.
    ///
    /// The new password is subject to the same policy as [UserStore::register].
    fn change_password(&mut self, id: UserID, new_password: &str) -> Result<(), Error>;
}

/// Check `username` and `password` and, if they belong to a registered user,
/// start a session for that user.
///
/// The session store is left untouched when the credentials are rejected.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if no user matches the credentials, or
/// any error raised by the stores.
pub fn log_in(
    users: &impl UserStore,
    sessions: &mut impl SessionStore,
    username: &str,
    password: &str,
) -> Result<Session, Error> {
    match users.verify(username, password)? {
        Some(user_id) => sessions.login(user_id),
        None => Err(Error::InvalidCredentials),
    }
}

/// Stores users in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteUserStore {
    connection: Arc<Mutex<Connection>>,
    cost: u32,
}

impl SQLiteUserStore {
    /// Create a new user store that hashes passwords with [PasswordHash::DEFAULT_COST].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self::with_cost(connection, PasswordHash::DEFAULT_COST)
    }

    /// Create a new user store that hashes passwords with the bcrypt `cost`.
    ///
    /// Low costs make hashing fast, which is useful in tests.
    pub fn with_cost(connection: Arc<Mutex<Connection>>, cost: u32) -> Self {
        Self { connection, cost }
    }

    fn hash_password(&self, password: &str) -> Result<PasswordHash, Error> {
        PasswordHash::new(ValidatedPassword::new(password)?, self.cost)
    }

    fn find_by_username(connection: &Connection, username: &str) -> Result<Option<User>, Error> {
        connection
            .prepare("SELECT id, username, password FROM users WHERE username = :username")?
            .query_row(&[(":username", username)], map_user_row)
            .optional()
            .map_err(|error| error.into())
    }
}

impl UserStore for SQLiteUserStore {
    /// Create and insert a new user into the database.
    ///
    /// The password is hashed before the database lock is taken. The username
    /// check and the insert then happen in one SQL transaction under the lock,
    /// so two registrations for the same name cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns a:
    /// - [Error::InvalidCredentials] if the username or password is rejected by the policy,
    /// - [Error::DuplicateUsername] if the username is taken,
    /// - [Error::HashingError] if the password could not be hashed,
    /// - or [Error::SqlError] if an SQL related error occurred.
    fn register(&mut self, username: &str, password: &str) -> Result<UserID, Error> {
        if !is_valid_username(username) {
            return Err(Error::InvalidCredentials);
        }

        let password_hash = self.hash_password(password)?;

        let connection = self.connection.lock()?;
        let transaction = connection.unchecked_transaction()?;

        if Self::find_by_username(&transaction, username)?.is_some() {
            return Err(Error::DuplicateUsername);
        }

        transaction.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            (username, password_hash.as_ref()),
        )?;
        let id = UserID::new(transaction.last_insert_rowid());

        transaction.commit()?;

        tracing::debug!("Registered user {username} with ID {id}");

        Ok(id)
    }

    /// Get the ID of the user whose username is exactly `username` and whose
    /// stored hash verifies `password`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::HashingError] if the stored hash is malformed, or an
    /// [Error::SqlError] if an SQL related error occurred.
    fn verify(&self, username: &str, password: &str) -> Result<Option<UserID>, Error> {
        let user = {
            let connection = self.connection.lock()?;
            Self::find_by_username(&connection, username)?
        };

        let Some(user) = user else {
            return Ok(None);
        };

        match user.password_hash.verify(password) {
            Ok(true) => Ok(Some(user.id)),
            Ok(false) => Ok(None),
            Err(error) => {
                tracing::error!("Unhandled error while verifying credentials: {error}");
                Err(Error::HashingError(error.to_string()))
            }
        }
    }

    fn exists(&self, username: &str) -> Result<bool, Error> {
        let connection = self.connection.lock()?;

        Ok(Self::find_by_username(&connection, username)?.is_some())
    }

    /// Get the user from the database that has the specified `id`.
    ///
    /// # Errors
    ///
    /// Returns a [Error::NotFound] error if there is no user with the specified ID or
    /// [Error::SqlError] if there are SQL related errors.
    fn get(&self, id: UserID) -> Result<User, Error> {
        self.connection
            .lock()?
            .prepare("SELECT id, username, password FROM users WHERE id = :id")?
            .query_row(&[(":id", &id.as_i64())], map_user_row)
            .map_err(|error| error.into())
    }

    fn count(&self) -> Result<usize, Error> {
        self.connection
            .lock()?
            .query_row("SELECT COUNT(id) FROM users;", [], |row| {
                row.get::<_, u32>(0).map(|count| count as usize)
            })
            .map_err(|error| error.into())
    }

    /// Hash `new_password` and store it for the user `id`.
    ///
    /// # Errors
    ///
    /// Returns a:
    /// - [Error::InvalidCredentials] if the password is rejected by the policy,
    /// - [Error::NotFound] if there is no user with the specified ID,
    /// - or [Error::SqlError] if an SQL related error occurred.
    fn change_password(&mut self, id: UserID, new_password: &str) -> Result<(), Error> {
        let password_hash = self.hash_password(new_password)?;

        let rows_affected = self.connection.lock()?.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2",
            (password_hash.as_ref(), id.as_i64()),
        )?;

        if rows_affected == 0 {
            return Err(Error::NotFound);
        }

        tracing::debug!("Changed password for user {id}");

        Ok(())
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let username = row.get(1)?;
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(raw_id),
        username,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}


#[cfg(test)]
mod user_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{SQLiteUserStore, UserID, UserStore};

    fn get_store() -> SQLiteUserStore {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        SQLiteUserStore::with_cost(Arc::new(Mutex::new(conn)), 4)
    }

    #[test]
    fn register_succeeds() {
        let mut store = get_store();

        let id = store.register("carol", "LongPass1!").unwrap();

        assert!(id.as_i64() > 0);
        let user = store.get(id).unwrap();
        assert_eq!(user.username, "carol");
        assert_ne!(
            user.password_hash.to_string(),
            "LongPass1!",
            "password should be stored hashed"
        );
    }

    #[test]
    fn register_fails_on_short_username() {
        let mut store = get_store();

        let result = store.register("ab", "Aaaaaaa1!");

        assert_eq!(result, Err(Error::InvalidCredentials));
        assert_eq!(store.count(), Ok(0));
    }

    #[test]
    fn register_fails_on_weak_password() {
        let mut store = get_store();

        let result = store.register("carol", "short");

        assert_eq!(result, Err(Error::InvalidCredentials));
        assert_eq!(store.count(), Ok(0));
    }

    #[test]
    fn register_fails_on_duplicate_username() {
        let mut store = get_store();
        store.register("carol", "LongPass1!").unwrap();

        let result = store.register("carol", "OtherPass2?");

        assert_eq!(result, Err(Error::DuplicateUsername));
        assert_eq!(store.count(), Ok(1));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let mut store = get_store();
        store.register("carol", "LongPass1!").unwrap();

        let result = store.register("Carol", "LongPass1!");

        assert!(result.is_ok(), "want \"Carol\" to be distinct from \"carol\"");
    }

    #[test]
    fn verify_succeeds_with_matching_credentials() {
        let mut store = get_store();
        let id = store.register("carol", "LongPass1!").unwrap();

        assert_eq!(store.verify("carol", "LongPass1!"), Ok(Some(id)));
    }

    #[test]
    fn verify_returns_none_on_wrong_password() {
        let mut store = get_store();
        store.register("carol", "LongPass1!").unwrap();

        assert_eq!(store.verify("carol", "LongPass2!"), Ok(None));
        assert_eq!(store.verify("carol", " LongPass1!"), Ok(None));
    }

    #[test]
    fn verify_returns_none_on_unknown_username() {
        let store = get_store();

        assert_eq!(store.verify("nobody", "LongPass1!"), Ok(None));
    }

    #[test]
    fn exists_ignores_password() {
        let mut store = get_store();
        store.register("carol", "LongPass1!").unwrap();

        assert_eq!(store.exists("carol"), Ok(true));
        assert_eq!(store.exists("dave"), Ok(false));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let store = get_store();

        assert_eq!(store.get(UserID::new(42)), Err(Error::NotFound));
    }

    #[test]
    fn change_password_replaces_old_password() {
        let mut store = get_store();
        let id = store.register("carol", "LongPass1!").unwrap();

        store.change_password(id, "NewPass99?").unwrap();

        assert_eq!(store.verify("carol", "LongPass1!"), Ok(None));
        assert_eq!(store.verify("carol", "NewPass99?"), Ok(Some(id)));
    }

    #[test]
    fn change_password_fails_on_missing_user() {
        let mut store = get_store();

        let result = store.change_password(UserID::new(42), "NewPass99?");

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn change_password_applies_policy() {
        let mut store = get_store();
        let id = store.register("carol", "LongPass1!").unwrap();

        let result = store.change_password(id, "weak");

        assert_eq!(result, Err(Error::InvalidCredentials));
        assert_eq!(store.verify("carol", "LongPass1!"), Ok(Some(id)));
    }
}
