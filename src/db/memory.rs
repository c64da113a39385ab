use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::models::{NewUser, ProfileUpdate, Session, User};
use crate::db::{SessionStore, UserRepository};
use crate::error::{AppError, DatabaseError};
use crate::Result;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, User>,
    next_user_id: i64,
    sessions: HashMap<String, Session>,
}

/// In-process user and session store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            email: user.email,
            password_hash: user.password_hash,
            nickname: String::new(),
            birthday: String::new(),
            introduction: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn update_profile(&self, id: i64, update: ProfileUpdate) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        user.nickname = update.nickname;
        user.birthday = update.birthday;
        user.introduction = update.introduction;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn touch(
        &self,
        token_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(session) = tables.sessions.get_mut(token_hash) {
            session.last_activity = last_activity;
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete(&self, token_hash: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}
