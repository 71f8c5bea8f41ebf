use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, StoreError, User};

/// Persistence for user records and their single live refresh token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user whose username or email matches. `None` for both yields `None`.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a user; a duplicate username or email fails with `Conflict`.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Unconditionally set (or clear) the stored refresh token.
    async fn update_refresh_token(&self, id: Uuid, token: Option<&str>)
        -> Result<(), StoreError>;

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns `false` when another writer got there first.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError>;
}

/// Postgres-backed store; every query is bounded by `timeout`.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
    timeout: Duration,
}

impl PgCredentialStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(sqlx::Error::Database(db))) if db.is_unique_violation() => {
                Err(StoreError::Conflict)
            }
            Ok(Err(e)) => Err(StoreError::Unavailable(anyhow::Error::new(e).context(op))),
            Err(_) => Err(StoreError::Unavailable(anyhow::anyhow!(
                "{op} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip(self))]
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }
        self.bounded(
            "find user by username or email",
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, email, full_name, password_hash, avatar, cover_image,
                       refresh_token, created_at, updated_at
                FROM users
                WHERE username = $1 OR email = $2
                LIMIT 1
                "#,
            )
            .bind(username)
            .bind(email)
            .fetch_optional(&self.db),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.bounded(
            "find user by id",
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, email, full_name, password_hash, avatar, cover_image,
                       refresh_token, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = self
            .bounded(
                "create user",
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (id, username, email, full_name, password_hash, avatar, cover_image)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id, username, email, full_name, password_hash, avatar, cover_image,
                              refresh_token, created_at, updated_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.full_name)
                .bind(&user.password_hash)
                .bind(&user.avatar)
                .bind(&user.cover_image)
                .fetch_one(&self.db),
            )
            .await?;
        debug!(user_id = %created.id, "user row inserted");
        Ok(created)
    }

    #[instrument(skip(self, token))]
    async fn update_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = self
            .bounded(
                "update refresh token",
                sqlx::query(
                    r#"
                    UPDATE users
                    SET refresh_token = $2, updated_at = now()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(token)
                .execute(&self.db),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, expected, next))]
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "swap refresh token",
                sqlx::query(
                    r#"
                    UPDATE users
                    SET refresh_token = $3, updated_at = now()
                    WHERE id = $1 AND refresh_token = $2
                    "#,
                )
                .bind(id)
                .bind(expected)
                .bind(next)
                .execute(&self.db),
            )
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
