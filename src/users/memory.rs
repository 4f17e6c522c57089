//! In-process [`UserStore`] with the same visibility and uniqueness rules as
//! the Postgres schema. Backs `AppState::fake()`.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User, UserChanges},
};

#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<User>,
    last_id: i64,
}

impl Inner {
    fn active(&self) -> impl Iterator<Item = &User> {
        self.rows.iter().filter(|u| u.deleted_at.is_none())
    }

    fn check_unique(&self, skip_id: Option<i64>, username: &str, email: &str) -> Result<(), StoreError> {
        for u in self.active().filter(|u| Some(u.id) != skip_id) {
            if u.email == email {
                return Err(StoreError::Conflict("email is already taken".into()));
            }
            if u.username == username {
                return Err(StoreError::Conflict("username is already taken".into()));
            }
        }
        Ok(())
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, tombstoned ones included.
    pub fn raw_rows(&self) -> Vec<User> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        inner.check_unique(None, &new_user.username, &new_user.email)?;
        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.last_id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().active().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().active().find(|u| u.email == email).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let inner = self.lock();
        let rows = inner
            .active()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.lock().active().count() as i64)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        let Some(current) = inner.active().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        inner.check_unique(Some(id), &username, &email)?;

        let Some(row) = inner.rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        row.username = username;
        row.email = email;
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner
            .rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            Some(row) => {
                row.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Fails every call the way a dropped pool does.
#[cfg(test)]
pub struct UnavailableUserStore;

#[cfg(test)]
#[async_trait]
impl UserStore for UnavailableUserStore {
    async fn create(&self, _new_user: NewUser) -> Result<User, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn find_by_id(&self, _id: i64) -> Result<Option<User>, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn list(&self, _limit: i64, _offset: i64) -> Result<Vec<User>, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn count(&self) -> Result<i64, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn update(&self, _id: i64, _changes: UserChanges) -> Result<Option<User>, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn soft_delete(&self, _id: i64) -> Result<bool, StoreError> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn tombstoned_rows_release_their_email() {
        let store = MemoryUserStore::new();
        let first = store.create(new_user("ann")).await.unwrap();
        assert!(store.soft_delete(first.id).await.unwrap());

        let second = store.create(new_user("ann")).await.expect("email reusable");
        assert_ne!(first.id, second.id);
        assert_eq!(store.raw_rows().len(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_rejects_taken_username() {
        let store = MemoryUserStore::new();
        store.create(new_user("ann")).await.unwrap();
        let bob = store.create(new_user("bob")).await.unwrap();

        let err = store
            .update(
                bob.id,
                UserChanges {
                    username: Some("ann".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_delete_twice_reports_missing() {
        let store = MemoryUserStore::new();
        let ann = store.create(new_user("ann")).await.unwrap();
        assert!(store.soft_delete(ann.id).await.unwrap());
        assert!(!store.soft_delete(ann.id).await.unwrap());
        assert!(store.find_by_id(ann.id).await.unwrap().is_none());
    }
}
