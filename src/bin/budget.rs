use std::{
    error::Error as StdError,
    fs::File,
    io::{self, Write},
    path::PathBuf,
    process::exit,
};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use budget_tracker::{
    Config, Error, FileSessionStore, SQLiteStatisticsStore, SQLiteTransactionStore,
    SQLiteUserStore, SessionStore, SortBy, StatisticsStore, Transaction, TransactionId,
    TransactionStore, TransactionUpdate, UserStore, ValidatedPassword, export::write_csv,
    input::{parse_amount, parse_date, parse_kind, require_non_empty},
    password::{MIN_PASSWORD_LENGTH, SPECIAL_CHARACTERS},
    user::{MIN_USERNAME_LENGTH, is_valid_username},
    log_in, month_abbreviation, open_db,
};

/// Track your income and expenses from the command line.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, global = true, env = "BUDGET_TRACKER_DB")]
    db_path: Option<PathBuf>,

    /// File path to the file that remembers the logged in user.
    #[arg(long, global = true, env = "BUDGET_TRACKER_SESSION")]
    session_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new user. The password is read from the terminal.
    Register { username: String },
    /// Log in as an existing user.
    Login { username: String },
    /// Log out the current user.
    Logout,
    /// Show the logged in user.
    Whoami,
    /// Record a new transaction.
    Add {
        /// Either "income" or "expense".
        kind: String,
        /// The amount of money. The sign is set from the kind.
        #[arg(allow_hyphen_values = true)]
        amount: String,
        category: String,
        /// The date in the form YYYY-MM-DD.
        date: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Change a transaction. The kind cannot be changed.
    Edit {
        id: TransactionId,
        #[arg(allow_hyphen_values = true)]
        amount: String,
        category: String,
        /// The date in the form YYYY-MM-DD.
        date: String,
        /// The new description. Keeps the old one if omitted.
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a transaction.
    Delete { id: TransactionId },
    /// List your transactions.
    List {
        #[arg(long, value_enum, default_value_t = SortOrder::Date)]
        sort: SortOrder,
    },
    /// Show your balance.
    Balance,
    /// Show income and expenses per month.
    Stats {
        /// Keep the same month of different years apart.
        #[arg(long)]
        by_year: bool,
    },
    /// Write your transactions as CSV.
    Export {
        /// Where to write the CSV. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Change your password.
    Passwd,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SortOrder {
    /// Newest first.
    Date,
    /// Smallest amount first.
    Amount,
}

impl From<SortOrder> for SortBy {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Date => SortBy::DateDescending,
            SortOrder::Amount => SortBy::AmountAscending,
        }
    }
}

fn main() -> Result<(), Box<dyn StdError>> {
    setup_logging();

    let args = Args::parse();

    if let Err(error) = run(args) {
        print_error(error);
        exit(1);
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn run(args: Args) -> Result<(), Error> {
    let config = Config::new(args.db_path, args.session_path);
    config.create_directories()?;

    let connection = open_db(config.db_path())?;
    let mut users = SQLiteUserStore::new(connection.clone());
    let mut sessions = FileSessionStore::new(config.session_path());
    let mut transactions = SQLiteTransactionStore::new(connection.clone());
    let statistics = SQLiteStatisticsStore::new(connection);

    match args.command {
        Command::Register { username } => {
            if !is_valid_username(&username) {
                return Err(Error::InvalidInput(format!(
                    "usernames need at least {MIN_USERNAME_LENGTH} characters"
                )));
            }

            let Some(password) = prompt_new_password()? else {
                return Ok(());
            };

            let user_id = users.register(&username, &password)?;
            tracing::info!("Registered user {user_id}");
            println!("Registered {username}. Log in with `budget login {username}`.");
        }
        Command::Login { username } => {
            let Some(password) = prompt_password("Password: ")? else {
                return Ok(());
            };

            log_in(&users, &mut sessions, &username, &password)?;
            println!("Logged in as {username}.");
        }
        Command::Logout => {
            sessions.logout()?;
            println!("Logged out.");
        }
        Command::Whoami => {
            let session = sessions.require_session()?;
            println!("{}", users.get(session.user_id())?.username);
        }
        Command::Add {
            kind,
            amount,
            category,
            date,
            description,
        } => {
            let session = sessions.require_session()?;
            let builder = Transaction::build(
                parse_kind(&kind)?,
                parse_amount(&amount)?,
                parse_date(&date)?,
            )
            .category(&require_non_empty("category", &category)?)
            .description(description.trim());

            let id = transactions.add(session.user_id(), builder)?;
            println!("Added transaction {id}.");
        }
        Command::Edit {
            id,
            amount,
            category,
            date,
            description,
        } => {
            let session = sessions.require_session()?;
            let existing = transactions.get_owned(session, id)?;
            let update = TransactionUpdate {
                amount: parse_amount(&amount)?,
                category: require_non_empty("category", &category)?,
                date: parse_date(&date)?,
                description: description
                    .map(|description| description.trim().to_owned())
                    .unwrap_or(existing.description),
            };

            if !transactions.update(id, update)? {
                return Err(Error::NotFound);
            }
            println!("Updated transaction {id}.");
        }
        Command::Delete { id } => {
            let session = sessions.require_session()?;
            transactions.get_owned(session, id)?;

            if !transactions.delete(id)? {
                return Err(Error::NotFound);
            }
            println!("Deleted transaction {id}.");
        }
        Command::List { sort } => {
            let session = sessions.require_session()?;
            print_transactions(&transactions.list_for_user(session.user_id(), sort.into())?);
        }
        Command::Balance => {
            let session = sessions.require_session()?;
            println!("{:.2}", statistics.balance(session.user_id())?);
        }
        Command::Stats { by_year } => {
            let session = sessions.require_session()?;
            let user_id = session.user_id();

            println!("{:<9}{:>12}{:>12}{:>12}", "Month", "Income", "Expenses", "Net");
            if by_year {
                for summary in statistics.year_month_statistics(user_id)? {
                    let month = month_abbreviation(&summary.month).unwrap_or(summary.month.as_str());
                    println!(
                        "{:<9}{:>12.2}{:>12.2}{:>12.2}",
                        format!("{month} {}", summary.year),
                        summary.total_income,
                        summary.total_expense,
                        summary.net()
                    );
                }
            } else {
                for summary in statistics.monthly_statistics(user_id)? {
                    println!(
                        "{:<9}{:>12.2}{:>12.2}{:>12.2}",
                        month_abbreviation(&summary.month).unwrap_or(summary.month.as_str()),
                        summary.total_income,
                        summary.total_expense,
                        summary.net()
                    );
                }
            }
        }
        Command::Export { output } => {
            let session = sessions.require_session()?;
            let list = transactions.list_for_user(session.user_id(), SortBy::DateDescending)?;

            match output {
                Some(path) => {
                    let file = File::create(&path).map_err(|error| {
                        Error::Export(format!("could not create {path:?}: {error}"))
                    })?;
                    write_csv(&list, file)?;
                    println!("Exported {} transactions to {path:?}.", list.len());
                }
                None => write_csv(&list, io::stdout().lock())?,
            }
        }
        Command::Passwd => {
            let session = sessions.require_session()?;
            let Some(password) = prompt_new_password()? else {
                return Ok(());
            };

            users.change_password(session.user_id(), &password)?;
            println!("Password updated successfully!");
        }
    }

    Ok(())
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions yet.");
        return;
    }

    let mut stdout = io::stdout().lock();

    for transaction in transactions {
        // A closed pipe (e.g. `budget list | head`) is not worth reporting.
        if writeln!(
            stdout,
            "{:>5}  {}  {:<7}  {:>12.2}  {}  {}",
            transaction.id,
            transaction.date,
            transaction.kind,
            transaction.amount,
            transaction.category,
            transaction.description
        )
        .is_err()
        {
            return;
        }
    }
}

/// Read a password without echoing it. Returns `None` on end of input.
fn prompt_password(prompt: &str) -> Result<Option<String>, Error> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Ok(Some(password)),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(error) => Err(Error::InvalidInput(format!(
            "could not read password from stdin: {error}"
        ))),
    }
}

/// Ask for a new password twice until both entries match and satisfy the
/// password policy. Returns `None` on end of input.
fn prompt_new_password() -> Result<Option<String>, Error> {
    loop {
        let Some(first_password) = prompt_password("Enter a new password: ")? else {
            return Ok(None);
        };

        if ValidatedPassword::new(&first_password).is_err() {
            print_error(format!(
                "Passwords need at least {MIN_PASSWORD_LENGTH} characters of letters, digits \
                 and {SPECIAL_CHARACTERS}, with at least one of the latter."
            ));
            continue;
        }

        let Some(second_password) = prompt_password("Enter the same password again: ")? else {
            return Ok(None);
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        return Ok(Some(first_password));
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
