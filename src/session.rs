//! Bearer-token session and the key-value store that keeps it across runs.

use std::{
    fs::{self, DirBuilder, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

use slog::{debug, warn, Logger};

use crate::client::User;

pub const TOKEN_KEY: &str = "api_token";
pub const USER_KEY: &str = "api_user";

/// Persistent string key-value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Keeps each entry in its own file under a state directory.
///
/// On unix the directory is private to the owner (0700) and each entry is
/// readable only by the owner (0600), since the token is a credential.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.dir.join(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut dir = DirBuilder::new();
        dir.recursive(true);
        #[cfg(unix)]
        dir.mode(0o700);
        dir.create(&self.dir)?;

        let path = self.dir.join(key);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path)?;

        // mode() only applies on creation, tighten files left by older runs
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(value.as_bytes())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.dir.join(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// The current session, mirrored to a [`SessionStore`].
pub struct SessionState {
    log: Logger,
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
}

impl SessionState {
    /// Restores a session from `store`. Half-written or unreadable entries are
    /// erased and the state starts out unauthenticated.
    pub fn restore(log: Logger, store: Box<dyn SessionStore>) -> Self {
        let current = match Self::load(&*store) {
            Ok(Some(session)) => {
                debug!(log, "Restored session"; "user" => &session.user.username);
                Some(session)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(log, "Discarding stored session"; "error" => %err);
                if let Err(err) = Self::erase(&*store) {
                    warn!(log, "Failed to erase stored session"; "error" => %err);
                }
                None
            }
        };

        Self {
            log,
            store,
            current: RwLock::new(current),
        }
    }

    fn load(store: &dyn SessionStore) -> io::Result<Option<Session>> {
        let token = store.get(TOKEN_KEY)?;
        let user = store.get(USER_KEY)?;
        match (token, user) {
            (None, None) => Ok(None),
            (Some(token), Some(user)) if !token.is_empty() => {
                let user = serde_json::from_str(&user).map_err(io::Error::other)?;
                Ok(Some(Session { token, user }))
            }
            _ => Err(io::Error::other("incomplete session")),
        }
    }

    fn erase(store: &dyn SessionStore) -> io::Result<()> {
        store.remove(TOKEN_KEY)?;
        store.remove(USER_KEY)
    }

    pub fn is_authorized(&self) -> bool {
        self.read(|s| s.is_some())
    }

    pub fn token(&self) -> Option<String> {
        self.read(|s| s.as_ref().map(|s| s.token.clone()))
    }

    pub fn user(&self) -> Option<User> {
        self.read(|s| s.as_ref().map(|s| s.user.clone()))
    }

    fn read<R>(&self, f: impl FnOnce(&Option<Session>) -> R) -> R {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Persists and activates `session`. Either both entries are stored and
    /// the session becomes current, or nothing changes.
    pub fn begin(&self, session: Session) -> io::Result<()> {
        let user = serde_json::to_string(&session.user).map_err(io::Error::other)?;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let stored = self
            .store
            .set(TOKEN_KEY, &session.token)
            .and_then(|_| self.store.set(USER_KEY, &user));
        if let Err(err) = stored {
            // put the store back to what memory still says
            let restored = match &*current {
                Some(prev) => serde_json::to_string(&prev.user)
                    .map_err(io::Error::other)
                    .and_then(|u| {
                        self.store.set(TOKEN_KEY, &prev.token)?;
                        self.store.set(USER_KEY, &u)
                    }),
                None => Self::erase(&*self.store),
            };
            if let Err(err) = restored {
                warn!(self.log, "Failed to roll back session store"; "error" => %err);
            }
            return Err(err);
        }

        debug!(self.log, "Session started"; "user" => &session.user.username);
        *current = Some(session);
        Ok(())
    }

    /// Drops the session from memory and storage.
    pub fn end(&self) -> io::Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = None;
        debug!(self.log, "Session ended");
        Self::erase(&*self.store)
    }
}
