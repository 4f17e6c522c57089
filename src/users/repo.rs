use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Access to the `users` table. Every read skips tombstoned rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Active users in insertion order.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
    /// Returns `None` when no active user has this id.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError>;
    /// Sets the tombstone. Returns `false` when no active user has this id.
    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let what = match db_err.constraint() {
                Some(c) if c.contains("email") => "email is already taken",
                Some(c) if c.contains("username") => "username is already taken",
                _ => "user already exists",
            };
            return StoreError::Conflict(what.to_string());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at, deleted_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM users WHERE deleted_at IS NULL"#)
                .fetch_one(&self.db)
                .await?;
        Ok(total)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, email, password_hash, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(user)
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
