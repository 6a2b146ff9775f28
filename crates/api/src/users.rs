//! In-memory user directory.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use relay_core::{CoreError, CoreResult, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Body of `POST /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(CoreError::validation("email must contain `@`"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Directory {
    users: BTreeMap<UserId, User>,
    next_id: u64,
}

/// Users keyed by id, handed out in ascending order.
#[derive(Debug)]
pub struct UserStore {
    inner: RwLock<Directory>,
}

impl UserStore {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Directory {
                users: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Seeded with Alice (1) and Bob (2).
    pub fn seeded() -> Self {
        let store = Self::empty();
        {
            let mut dir = store.write();
            for (name, email) in [("Alice", "alice@example.com"), ("Bob", "bob@example.com")] {
                dir.insert(name, email);
            }
        }
        store
    }

    pub fn list(&self) -> Vec<User> {
        self.read().users.values().cloned().collect()
    }

    pub fn get(&self, id: UserId) -> CoreResult<User> {
        self.read().users.get(&id).cloned().ok_or(CoreError::NotFound)
    }

    pub fn create(&self, new: NewUser) -> CoreResult<User> {
        new.validate()?;
        Ok(self.write().insert(new.name.trim(), new.email.trim()))
    }

    // A panic while holding the lock cannot leave the map half-written.
    fn read(&self) -> RwLockReadGuard<'_, Directory> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Directory> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Directory {
    fn insert(&mut self, name: &str, email: &str) -> User {
        let user = User {
            id: UserId(self.next_id),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.next_id += 1;
        self.users.insert(user.id, user.clone());
        user
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn seeded_store_lists_alice_and_bob() {
        let store = UserStore::seeded();
        let names: Vec<_> = store.list().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn create_assigns_next_id() {
        let store = UserStore::seeded();
        let charlie = store.create(new_user("Charlie", "charlie@example.com")).unwrap();
        assert_eq!(charlie.id, UserId(3));
        assert_eq!(store.get(UserId(3)).unwrap(), charlie);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let store = UserStore::seeded();
        assert!(matches!(store.get(UserId(9999)), Err(CoreError::NotFound)));
    }

    #[test]
    fn invalid_user_is_rejected() {
        let store = UserStore::empty();
        assert!(matches!(
            store.create(new_user("", "x@example.com")),
            Err(CoreError::Validation(_))
        ));
        assert!(store.list().is_empty());
    }
}
