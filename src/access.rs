use tracing::{info, instrument};

use crate::error::Result;
use crate::io::users::{UserId, UserStore};

/// Result of an admin request to allow a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Allow-list of users who may query the dataset, plus the single admin who
/// may change it.
///
/// The list is read from the store once on construction and written back
/// before every acknowledged change.
#[derive(Debug)]
pub struct AccessControl<S> {
    admin: UserId,
    users: Vec<UserId>,
    store: S,
}

impl<S: UserStore> AccessControl<S> {
    pub fn new(admin: UserId, store: S) -> Result<Self> {
        let users = store.load()?;
        info!(admin, users = users.len(), "allow-list loaded");
        Ok(Self {
            admin,
            users,
            store,
        })
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        user == self.admin
    }

    /// Whether `user` may run lookups. The admin is not implicitly included.
    pub fn is_allowed(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Adds `user` to the allow-list and persists it.
    ///
    /// The in-memory list only changes once the store accepted the new list.
    #[instrument(level = "info", skip(self))]
    pub fn add(&mut self, user: UserId) -> Result<AddOutcome> {
        if self.users.contains(&user) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let mut updated = self.users.clone();
        updated.push(user);
        self.store.save(&updated)?;
        self.users = updated;
        info!(count = self.users.len(), "user added to allow-list");
        Ok(AddOutcome::Added)
    }
}
