use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::models::{NewUser, ProfileUpdate, Session, User};
use crate::db::{SessionStore, UserRepository};
use crate::error::{AppError, DatabaseError};
use crate::Result;

const USER_COLUMNS: &str =
    "id, email, password_hash, nickname, birthday, introduction, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, token_hash, created_at, last_activity, expires_at";

#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for DbOperations {
    async fn create(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO users (email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool.as_ref())
            .await?;

        debug!("Inserted user {}", user.id);
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn update_profile(&self, id: i64, update: ProfileUpdate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET nickname = $1, birthday = $2, introduction = $3, updated_at = $4 \
             WHERE id = $5",
        )
        .bind(&update.nickname)
        .bind(&update.birthday)
        .bind(&update.introduction)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for DbOperations {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_sessions (id, user_id, token_hash, created_at, last_activity, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.last_activity)
        .bind(session.expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        let query = format!(
            "SELECT {} FROM user_sessions WHERE token_hash = $1",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(token_hash)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    async fn touch(
        &self,
        token_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE user_sessions SET last_activity = $1, expires_at = $2 WHERE token_hash = $3",
        )
        .bind(last_activity)
        .bind(expires_at)
        .bind(token_hash)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut transaction = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}
