//! Budget tracker is a personal finance ledger backed by SQLite.
//!
//! This library provides the user accounts, login session, transaction
//! ledger and statistics that the `budget` command line tool is built on.
//!
//! # Getting started
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use rusqlite::Connection;
//! use time::macros::date;
//!
//! use budget_tracker::{
//!     MemorySessionStore, SQLiteStatisticsStore, SQLiteTransactionStore, SQLiteUserStore,
//!     SessionStore, StatisticsStore, Transaction, TransactionKind, TransactionStore, UserStore,
//!     initialize_db, log_in,
//! };
//!
//! let conn = Connection::open_in_memory().unwrap();
//! initialize_db(&conn).unwrap();
//! let conn = Arc::new(Mutex::new(conn));
//!
//! let mut users = SQLiteUserStore::with_cost(conn.clone(), 4);
//! let mut sessions = MemorySessionStore::default();
//! let mut transactions = SQLiteTransactionStore::new(conn.clone());
//! let statistics = SQLiteStatisticsStore::new(conn);
//!
//! users.register("alice", "hunter2!!").unwrap();
//! let session = log_in(&users, &mut sessions, "alice", "hunter2!!").unwrap();
//!
//! transactions
//!     .add(
//!         session.user_id(),
//!         Transaction::build(TransactionKind::Expense, 20.0, date!(2024 - 03 - 20)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(statistics.balance(session.user_id()).unwrap(), -20.0);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod export;
pub mod input;
pub mod password;
pub mod statistics;
pub mod transaction;
pub mod user;

mod db;
mod error;
mod session;

pub use config::Config;
pub use db::{initialize as initialize_db, open as open_db};
pub use error::Error;
pub use password::{PasswordHash, ValidatedPassword};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use statistics::{
    MonthlySummary, SQLiteStatisticsStore, StatisticsStore, YearMonthSummary, month_abbreviation,
};
pub use transaction::{
    SQLiteTransactionStore, SortBy, Transaction, TransactionBuilder, TransactionId,
    TransactionKind, TransactionStore, TransactionUpdate,
};
pub use user::{SQLiteUserStore, User, UserID, UserStore, log_in};
