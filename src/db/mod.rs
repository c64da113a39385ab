//! Database module for the webook server
//!
//! Storage traits for users and login sessions, the Postgres
//! implementation and an in-process store.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

pub use memory::MemoryStore;
pub use models::{NewUser, Profile, ProfileUpdate, Session, User};
pub use operations::DbOperations;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Fails with `DatabaseError::NotFound` when no user has this id.
    async fn update_profile(&self, id: i64, update: ProfileUpdate) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<()>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>>;

    async fn touch(
        &self,
        token_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete(&self, token_hash: &str) -> Result<()>;

    /// Returns the number of sessions removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
