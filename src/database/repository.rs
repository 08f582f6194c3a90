use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::models::{BrainDump, NewUser, User, DEFAULT_PLAN};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(what.to_string());
        }
    }
    RepositoryError::Sqlx(err)
}

/// Credential record persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; a taken username yields `RepositoryError::Conflict`
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
    async fn health_check(&self) -> Result<(), RepositoryError>;
}

/// Brain dumps, always scoped to their owner
#[async_trait]
pub trait BrainDumpRepository: Send + Sync {
    async fn list(&self, user_id: Uuid) -> Result<Vec<BrainDump>, RepositoryError>;
    async fn create(&self, user_id: Uuid, content: &str) -> Result<BrainDump, RepositoryError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<BrainDump>, RepositoryError>;
    async fn update(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Option<BrainDump>, RepositoryError>;
    /// Returns whether a row was deleted
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepositoryError>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let initials = new_user.initials();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password, display_name, initials, plan)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, password, display_name, initials, plan, created_at, last_login_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.display_name)
        .bind(&initials)
        .bind(DEFAULT_PLAN)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &new_user.username))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, display_name, initials, plan, created_at, last_login_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, display_name, initials, plan, created_at, last_login_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgBrainDumpRepository {
    pool: PgPool,
}

impl PgBrainDumpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BrainDumpRepository for PgBrainDumpRepository {
    async fn list(&self, user_id: Uuid) -> Result<Vec<BrainDump>, RepositoryError> {
        let rows = sqlx::query_as::<_, BrainDump>(
            "SELECT id, user_id, content, created_at, updated_at FROM brain_dumps WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create(&self, user_id: Uuid, content: &str) -> Result<BrainDump, RepositoryError> {
        let row = sqlx::query_as::<_, BrainDump>(
            r#"
            INSERT INTO brain_dumps (id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, content, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<BrainDump>, RepositoryError> {
        let row = sqlx::query_as::<_, BrainDump>(
            "SELECT id, user_id, content, created_at, updated_at FROM brain_dumps WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Option<BrainDump>, RepositoryError> {
        let row = sqlx::query_as::<_, BrainDump>(
            r#"
            UPDATE brain_dumps SET content = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM brain_dumps WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
