use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::CredentialStore,
    repo_types::{NewUser, StoreError, User},
};

/// Process-local store used when no database is configured, and by tests.
/// All reads and the refresh-token compare-and-swap happen under one lock.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow::anyhow!("memory store lock poisoned")))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users()?;
        Ok(users
            .values()
            .find(|u| {
                username.is_some_and(|name| u.username == name)
                    || email.is_some_and(|mail| u.email == mail)
            })
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users()?.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users()?;
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            avatar: user.avatar,
            cover_image: user.cover_image,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut users = self.users()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.refresh_token = token.map(str::to_owned);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        if user.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token = next.map(str::to_owned);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }
}
