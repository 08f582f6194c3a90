//! In-process repositories for development runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{BrainDump, NewUser, User, DEFAULT_PLAN};
use super::repository::{BrainDumpRepository, RepositoryError, UserRepository};

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == new_user.username) {
            return Err(RepositoryError::Conflict(new_user.username));
        }

        let user = User {
            id: Uuid::new_v4(),
            initials: new_user.initials(),
            username: new_user.username,
            password: new_user.password_hash,
            display_name: new_user.display_name,
            plan: DEFAULT_PLAN.to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        user.password = password_hash.to_string();
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBrainDumpRepository {
    dumps: RwLock<HashMap<Uuid, BrainDump>>,
}

impl MemoryBrainDumpRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrainDumpRepository for MemoryBrainDumpRepository {
    async fn list(&self, user_id: Uuid) -> Result<Vec<BrainDump>, RepositoryError> {
        let dumps = self.dumps.read().await;
        let mut owned: Vec<BrainDump> = dumps.values().filter(|d| d.user_id == user_id).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn create(&self, user_id: Uuid, content: &str) -> Result<BrainDump, RepositoryError> {
        let now = Utc::now();
        let dump = BrainDump {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.dumps.write().await.insert(dump.id, dump.clone());
        Ok(dump)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<BrainDump>, RepositoryError> {
        let dumps = self.dumps.read().await;
        Ok(dumps.get(&id).filter(|d| d.user_id == user_id).cloned())
    }

    async fn update(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Option<BrainDump>, RepositoryError> {
        let mut dumps = self.dumps.write().await;
        match dumps.get_mut(&id) {
            Some(dump) if dump.user_id == user_id => {
                dump.content = content.to_string();
                dump.updated_at = Utc::now();
                Ok(Some(dump.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepositoryError> {
        let mut dumps = self.dumps.write().await;
        let owned = dumps.get(&id).is_some_and(|d| d.user_id == user_id);
        if owned {
            dumps.remove(&id);
        }
        Ok(owned)
    }
}
