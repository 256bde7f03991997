use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Numeric identity of a messaging user.
pub type UserId = i64;

/// Durable storage for the allow-list.
pub trait UserStore {
    /// Reads the full list. A store that was never written yields an empty list.
    fn load(&self) -> Result<Vec<UserId>>;

    /// Replaces the stored list with `users`.
    fn save(&self, users: &[UserId]) -> Result<()>;
}

/// Stores the allow-list as a JSON array of integers.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UserStore for JsonFileStore {
    fn load(&self) -> Result<Vec<UserId>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no allow-list file yet");
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, users: &[UserId]) -> Result<()> {
        let json = serde_json::to_string(users)?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), count = users.len(), "allow-list saved");
        Ok(())
    }
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RefCell<Vec<UserId>>,
}

impl MemoryStore {
    pub fn new(users: Vec<UserId>) -> Self {
        Self {
            users: RefCell::new(users),
        }
    }

    /// Returns what was last saved.
    pub fn snapshot(&self) -> Vec<UserId> {
        self.users.borrow().clone()
    }
}

impl UserStore for MemoryStore {
    fn load(&self) -> Result<Vec<UserId>> {
        Ok(self.snapshot())
    }

    fn save(&self, users: &[UserId]) -> Result<()> {
        *self.users.borrow_mut() = users.to_vec();
        Ok(())
    }
}

impl<S: UserStore + ?Sized> UserStore for &S {
    fn load(&self) -> Result<Vec<UserId>> {
        (**self).load()
    }

    fn save(&self, users: &[UserId]) -> Result<()> {
        (**self).save(users)
    }
}
