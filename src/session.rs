//! Keeps track of which user is logged in.
//!
//! A [Session] is created by [SessionStore::login] and ends with
//! [SessionStore::logout]. The [FileSessionStore] keeps the logged in user in
//! a small JSON document so that the session survives restarts.

use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, user::UserID};

/// Proof that a user is logged in.
///
/// Pass a session to the operations that act on behalf of the logged in user
/// instead of looking the user up from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    user_id: UserID,
}

impl Session {
    /// The ID of the logged in user.
    pub fn user_id(&self) -> UserID {
        self.user_id
    }
}

/// Holds at most one logged in user.
pub trait SessionStore {
    /// Log in as `user_id`, replacing any user that was logged in before.
    fn login(&mut self, user_id: UserID) -> Result<Session, Error>;

    /// The ID of the logged in user, or `None` if nobody is logged in.
    fn current_user(&self) -> Result<Option<UserID>, Error>;

    /// Log out the current user. Does nothing if nobody is logged in.
    fn logout(&mut self) -> Result<(), Error>;

    /// The session of the logged in user, or `None` if nobody is logged in.
    fn current_session(&self) -> Result<Option<Session>, Error> {
        Ok(self.current_user()?.map(|user_id| Session { user_id }))
    }

    /// The session of the logged in user.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotLoggedIn] if nobody is logged in.
    fn require_session(&self) -> Result<Session, Error> {
        self.current_session()?.ok_or(Error::NotLoggedIn)
    }
}

/// A session store that only lives as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    user_id: Option<UserID>,
}

impl SessionStore for MemorySessionStore {
    fn login(&mut self, user_id: UserID) -> Result<Session, Error> {
        self.user_id = Some(user_id);

        Ok(Session { user_id })
    }

    fn current_user(&self) -> Result<Option<UserID>, Error> {
        Ok(self.user_id)
    }

    fn logout(&mut self) -> Result<(), Error> {
        self.user_id = None;

        Ok(())
    }
}

/// The on-disk form of the session. A missing `user_id` means logged out.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserID>,
}

/// Stores the logged in user in a JSON file.
///
/// The file is read on every call, so the store always reflects the last
/// login or logout, even one made by an earlier run of the program.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a session store backed by the file at `path`.
    ///
    /// The file does not need to exist; a missing file means nobody is logged in.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sibling file that writes go through, e.g. `session.json.tmp`.
    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        file_name.push(".tmp");

        self.path.with_file_name(file_name)
    }

    fn read(&self) -> Result<SessionDocument, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(SessionDocument::default());
            }
            Err(error) => return Err(Error::SessionStorage(error.to_string())),
        };

        match serde_json::from_str(&contents) {
            Ok(document) => Ok(document),
            Err(error) => {
                tracing::warn!(
                    "Ignoring unreadable session file {:?}: {error}",
                    self.path
                );
                Ok(SessionDocument::default())
            }
        }
    }

    /// Write `document` to a temporary file next to the session file and
    /// rename it over the session file.
    fn write(&self, document: &SessionDocument) -> Result<(), Error> {
        let storage_error = |error: io::Error| Error::SessionStorage(error.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }

        let contents = serde_json::to_string(document)
            .map_err(|error| Error::SessionStorage(error.to_string()))?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).map_err(storage_error)?;
        file.write_all(contents.as_bytes()).map_err(storage_error)?;
        file.sync_all().map_err(storage_error)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(storage_error)
    }
}

impl SessionStore for FileSessionStore {
    fn login(&mut self, user_id: UserID) -> Result<Session, Error> {
        self.write(&SessionDocument {
            user_id: Some(user_id),
        })?;

        tracing::debug!("Logged in user {user_id}");

        Ok(Session { user_id })
    }

    fn current_user(&self) -> Result<Option<UserID>, Error> {
        Ok(self.read()?.user_id)
    }

    fn logout(&mut self) -> Result<(), Error> {
        self.write(&SessionDocument::default())?;

        tracing::debug!("Logged out");

        Ok(())
    }
}
