//! Balance and month-bucketed income/expense totals.
//!
//! Every query aggregates the stored transactions directly; nothing is cached,
//! so each call reflects all writes made before it.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{Error, user::UserID};

/// The income and expenses of one calendar month, merged across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// The two digit month, "01" to "12".
    pub month: String,
    /// The sum of the positive amounts in the month.
    pub total_income: f64,
    /// The sum of the negative amounts in the month.
    pub total_expense: f64,
}

impl MonthlySummary {
    /// Income plus expenses for the month.
    pub fn net(&self) -> f64 {
        self.total_income + self.total_expense
    }
}

/// The income and expenses of one month of one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearMonthSummary {
    /// The four digit year, e.g. "2024".
    pub year: String,
    /// The two digit month, "01" to "12".
    pub month: String,
    /// The sum of the positive amounts in the month.
    pub total_income: f64,
    /// The sum of the negative amounts in the month.
    pub total_expense: f64,
}

impl YearMonthSummary {
    /// Income plus expenses for the month.
    pub fn net(&self) -> f64 {
        self.total_income + self.total_expense
    }
}

/// Formats a two digit month code as a three-letter English abbreviation.
///
/// Returns `None` for anything other than "01" to "12".
pub fn month_abbreviation(month: &str) -> Option<&'static str> {
    let name = match month {
        "01" => "Jan",
        "02" => "Feb",
        "03" => "Mar",
        "04" => "Apr",
        "05" => "May",
        "06" => "Jun",
        "07" => "Jul",
        "08" => "Aug",
        "09" => "Sep",
        "10" => "Oct",
        "11" => "Nov",
        "12" => "Dec",
        _ => return None,
    };

    Some(name)
}

/// Computes read-only summaries over a user's transactions.
pub trait StatisticsStore {
    /// The sum of all the user's signed transaction amounts, or zero if the
    /// user has no transactions.
    fn balance(&self, user_id: UserID) -> Result<f64, Error>;

    /// The user's income and expenses grouped by month of the year, ignoring
    /// the year, in month order. Months without transactions are left out.
    fn monthly_statistics(&self, user_id: UserID) -> Result<Vec<MonthlySummary>, Error>;

    /// The user's income and expenses grouped by year and month, oldest
    /// first. Months without transactions are left out.
    fn year_month_statistics(&self, user_id: UserID) -> Result<Vec<YearMonthSummary>, Error>;
}

/// Aggregates transactions stored in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteStatisticsStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteStatisticsStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl StatisticsStore for SQLiteStatisticsStore {
    /// # Errors
    /// Returns an [Error::SqlError] if the SQL query fails.
    fn balance(&self, user_id: UserID) -> Result<f64, Error> {
        let balance = self.connection.lock()?.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM transactions WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0),
        )?;

        Ok(balance)
    }

    /// # Errors
    /// Returns an [Error::SqlError] if the SQL query fails.
    fn monthly_statistics(&self, user_id: UserID) -> Result<Vec<MonthlySummary>, Error> {
        self.connection
            .lock()?
            .prepare(
                "SELECT strftime('%m', date) AS month,
                    COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0.0 END), 0.0) AS total_income,
                    COALESCE(SUM(CASE WHEN amount < 0 THEN amount ELSE 0.0 END), 0.0) AS total_expense
                 FROM transactions
                 WHERE user_id = :user_id
                 GROUP BY month
                 ORDER BY month",
            )?
            .query_map(&[(":user_id", &user_id.as_i64())], map_monthly_row)?
            .map(|maybe_summary| maybe_summary.map_err(Error::from))
            .collect()
    }

    /// # Errors
    /// Returns an [Error::SqlError] if the SQL query fails.
    fn year_month_statistics(&self, user_id: UserID) -> Result<Vec<YearMonthSummary>, Error> {
        self.connection
            .lock()?
            .prepare(
                "SELECT strftime('%Y', date) AS year,
                    strftime('%m', date) AS month,
                    COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0.0 END), 0.0) AS total_income,
                    COALESCE(SUM(CASE WHEN amount < 0 THEN amount ELSE 0.0 END), 0.0) AS total_expense
                 FROM transactions
                 WHERE user_id = :user_id
                 GROUP BY year, month
                 ORDER BY year, month",
            )?
            .query_map(&[(":user_id", &user_id.as_i64())], map_year_month_row)?
            .map(|maybe_summary| maybe_summary.map_err(Error::from))
            .collect()
    }
}

fn map_monthly_row(row: &Row) -> Result<MonthlySummary, rusqlite::Error> {
    Ok(MonthlySummary {
        month: row.get(0)?,
        total_income: row.get(1)?,
        total_expense: row.get(2)?,
    })
}

fn map_year_month_row(row: &Row) -> Result<YearMonthSummary, rusqlite::Error> {
    Ok(YearMonthSummary {
        year: row.get(0)?,
        month: row.get(1)?,
        total_income: row.get(2)?,
        total_expense: row.get(3)?,
    })
}

#[cfg(test)]
mod month_abbreviation_tests {
    use super::month_abbreviation;

    #[test]
    fn formats_all_months() {
        let got: Vec<_> = (1..=12)
            .map(|month| month_abbreviation(&format!("{month:02}")).unwrap())
            .collect();

        assert_eq!(
            got,
            vec![
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"
            ]
        );
    }

    #[test]
    fn rejects_invalid_month() {
        assert_eq!(month_abbreviation("13"), None);
        assert_eq!(month_abbreviation("1"), None);
        assert_eq!(month_abbreviation(""), None);
    }
}

#[cfg(test)]
mod sqlite_statistics_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        db::initialize,
        transaction::{
            SQLiteTransactionStore, SortBy, Transaction, TransactionKind, TransactionStore,
        },
        user::{SQLiteUserStore, UserID, UserStore},
    };

    use super::{MonthlySummary, SQLiteStatisticsStore, StatisticsStore, YearMonthSummary};

    struct Fixture {
        transactions: SQLiteTransactionStore,
        statistics: SQLiteStatisticsStore,
        user_id: UserID,
    }

    fn get_fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let connection = Arc::new(Mutex::new(conn));

        let user_id = SQLiteUserStore::with_cost(connection.clone(), 4)
            .register("carol", "LongPass1!")
            .unwrap();

        Fixture {
            transactions: SQLiteTransactionStore::new(connection.clone()),
            statistics: SQLiteStatisticsStore::new(connection),
            user_id,
        }
    }

    fn add(fixture: &mut Fixture, kind: TransactionKind, amount: f64, date: Date) {
        fixture
            .transactions
            .add(fixture.user_id, Transaction::build(kind, amount, date))
            .unwrap();
    }

    #[test]
    fn balance_is_zero_without_transactions() {
        let fixture = get_fixture();

        assert_eq!(fixture.statistics.balance(fixture.user_id), Ok(0.0));
    }

    #[test]
    fn statistics_are_empty_without_transactions() {
        let fixture = get_fixture();

        assert_eq!(
            fixture.statistics.monthly_statistics(fixture.user_id),
            Ok(vec![])
        );
        assert_eq!(
            fixture.statistics.year_month_statistics(fixture.user_id),
            Ok(vec![])
        );
    }

    #[test]
    fn balance_and_monthly_statistics_for_example_user() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 1000.0, date!(2024 - 03 - 05));
        add(&mut fixture, TransactionKind::Expense, 200.0, date!(2024 - 03 - 20));
        add(&mut fixture, TransactionKind::Income, 50.0, date!(2024 - 04 - 01));

        assert_eq!(fixture.statistics.balance(fixture.user_id), Ok(850.0));
        assert_eq!(
            fixture.statistics.monthly_statistics(fixture.user_id),
            Ok(vec![
                MonthlySummary {
                    month: "03".to_owned(),
                    total_income: 1000.0,
                    total_expense: -200.0,
                },
                MonthlySummary {
                    month: "04".to_owned(),
                    total_income: 50.0,
                    total_expense: 0.0,
                },
            ])
        );
    }

    #[test]
    fn adding_transaction_changes_balance_by_normalized_amount() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 100.0, date!(2024 - 01 - 01));
        let before = fixture.statistics.balance(fixture.user_id).unwrap();

        add(&mut fixture, TransactionKind::Expense, 30.0, date!(2024 - 01 - 02));

        let after = fixture.statistics.balance(fixture.user_id).unwrap();
        assert_eq!(after - before, -30.0);
    }

    #[test]
    fn balance_equals_sum_of_stored_amounts() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 12.25, date!(2023 - 11 - 01));
        add(&mut fixture, TransactionKind::Expense, -7.5, date!(2024 - 02 - 14));
        add(&mut fixture, TransactionKind::Expense, 3.25, date!(2024 - 02 - 15));

        let sum: f64 = fixture
            .transactions
            .list_for_user(fixture.user_id, SortBy::DateDescending)
            .unwrap()
            .iter()
            .map(|transaction| transaction.amount)
            .sum();

        assert_eq!(fixture.statistics.balance(fixture.user_id), Ok(sum));
        assert_eq!(sum, 1.5);
    }

    #[test]
    fn monthly_totals_add_up_to_balance() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 500.0, date!(2024 - 01 - 31));
        add(&mut fixture, TransactionKind::Expense, 125.0, date!(2024 - 01 - 02));
        add(&mut fixture, TransactionKind::Expense, 80.0, date!(2024 - 06 - 15));
        add(&mut fixture, TransactionKind::Income, 40.0, date!(2024 - 12 - 24));

        let monthly = fixture
            .statistics
            .monthly_statistics(fixture.user_id)
            .unwrap();
        let total: f64 = monthly.iter().map(|summary| summary.net()).sum();

        assert_eq!(Ok(total), fixture.statistics.balance(fixture.user_id));
        let months: Vec<_> = monthly.iter().map(|summary| summary.month.as_str()).collect();
        assert_eq!(months, vec!["01", "06", "12"]);
        for summary in &monthly {
            assert!(summary.total_income >= 0.0, "{summary:?}");
            assert!(summary.total_expense <= 0.0, "{summary:?}");
        }
    }

    #[test]
    fn monthly_statistics_merges_years() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 10.0, date!(2023 - 03 - 01));
        add(&mut fixture, TransactionKind::Income, 20.0, date!(2024 - 03 - 01));

        assert_eq!(
            fixture.statistics.monthly_statistics(fixture.user_id),
            Ok(vec![MonthlySummary {
                month: "03".to_owned(),
                total_income: 30.0,
                total_expense: 0.0,
            }])
        );
    }

    #[test]
    fn year_month_statistics_keeps_years_apart() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 20.0, date!(2024 - 03 - 01));
        add(&mut fixture, TransactionKind::Expense, 5.0, date!(2023 - 03 - 09));
        add(&mut fixture, TransactionKind::Income, 10.0, date!(2023 - 03 - 01));

        assert_eq!(
            fixture.statistics.year_month_statistics(fixture.user_id),
            Ok(vec![
                YearMonthSummary {
                    year: "2023".to_owned(),
                    month: "03".to_owned(),
                    total_income: 10.0,
                    total_expense: -5.0,
                },
                YearMonthSummary {
                    year: "2024".to_owned(),
                    month: "03".to_owned(),
                    total_income: 20.0,
                    total_expense: 0.0,
                },
            ])
        );
    }

    #[test]
    fn statistics_only_include_the_user() {
        let mut fixture = get_fixture();
        add(&mut fixture, TransactionKind::Income, 10.0, date!(2024 - 03 - 01));

        let other_user = UserID::new(fixture.user_id.as_i64() + 1);

        assert_eq!(fixture.statistics.balance(other_user), Ok(0.0));
        assert_eq!(fixture.statistics.monthly_statistics(other_user), Ok(vec![]));
    }
}
