//! Where the application keeps its files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Error;

/// The database file name used when no path is given.
pub const DEFAULT_DB_FILE: &str = "budget.db";

/// The session file name used when no path is given.
pub const DEFAULT_SESSION_FILE: &str = "session.json";

/// The resolved locations of the database and session files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    db_path: PathBuf,
    session_path: PathBuf,
}

impl Config {
    /// Resolve the file locations, falling back to [DEFAULT_DB_FILE] and
    /// [DEFAULT_SESSION_FILE] in the current directory.
    pub fn new(db_path: Option<PathBuf>, session_path: Option<PathBuf>) -> Self {
        Self {
            db_path: db_path.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE)),
            session_path: session_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
        }
    }

    /// The path of the SQLite database.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The path of the JSON session file.
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Create the parent directories of both files if they are missing.
    ///
    /// # Errors
    ///
    /// Returns [Error::Storage] naming the directory that could not be created.
    pub fn create_directories(&self) -> Result<(), Error> {
        for path in [&self.db_path, &self.session_path] {
            let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
                continue;
            };

            fs::create_dir_all(parent).map_err(|error| {
                Error::Storage(format!("could not create the directory {parent:?}: {error}"))
            })?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod config_tests {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use tempfile::TempDir;

    use crate::Error;

    use super::Config;

    #[test]
    fn defaults_to_current_directory() {
        let config = Config::default();

        assert_eq!(config.db_path(), Path::new("budget.db"));
        assert_eq!(config.session_path(), Path::new("session.json"));
    }

    #[test]
    fn uses_given_paths() {
        let config = Config::new(Some(PathBuf::from("/tmp/a.db")), None);

        assert_eq!(config.db_path(), Path::new("/tmp/a.db"));
        assert_eq!(config.session_path(), Path::new("session.json"));
    }

    #[test]
    fn creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(
            Some(dir.path().join("data").join("budget.db")),
            Some(dir.path().join("state").join("session.json")),
        );

        config.create_directories().unwrap();

        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("state").is_dir());
    }

    #[test]
    fn reports_storage_error_when_directory_cannot_be_created() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let config = Config::new(Some(blocker.join("data").join("budget.db")), None);

        let result = config.create_directories();

        assert!(
            matches!(result, Err(Error::Storage(_))),
            "want a storage error, got {result:?}"
        );
    }
}
