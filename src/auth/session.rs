use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::RepositoryError;

pub const SESSION_ID_BYTES: usize = 32;

/// Server-side session: opaque id -> user id, valid until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub sid: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        Self {
            sid: generate_session_id(),
            user_id,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// 32 bytes from the OS RNG, hex encoded
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, RepositoryError>;
    /// Live session for `sid`; expired sessions are reported as absent
    async fn find(&self, sid: &str) -> Result<Option<Session>, RepositoryError>;
    async fn destroy(&self, sid: &str) -> Result<(), RepositoryError>;
    /// Destroy every session belonging to `user_id`, returning how many
    async fn destroy_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
    async fn purge_expired(&self) -> Result<u64, RepositoryError>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, RepositoryError> {
        let session = Session::new(user_id, ttl);
        self.sessions
            .write()
            .await
            .insert(session.sid.clone(), session.clone());
        Ok(session)
    }

    async fn find(&self, sid: &str) -> Result<Option<Session>, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(sid).cloned() {
            Some(session) if session.is_expired_at(Utc::now()) => {
                sessions.remove(sid);
                Ok(None)
            }
            found => Ok(found),
        }
    }

    async fn destroy(&self, sid: &str) -> Result<(), RepositoryError> {
        self.sessions.write().await.remove(sid);
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<Session, RepositoryError> {
        let session = Session::new(user_id, ttl);
        sqlx::query("INSERT INTO sessions (sid, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.sid)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(session)
    }

    async fn find(&self, sid: &str) -> Result<Option<Session>, RepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT sid, user_id, expires_at FROM sessions WHERE sid = $1 AND expires_at > $2",
        )
        .bind(sid)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn destroy(&self, sid: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE sid = $1")
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
