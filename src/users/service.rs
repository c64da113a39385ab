use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{NewUser, ProfileUpdate, User, UserRepository};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::Result;

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, bcrypt_cost: u32) -> Self {
        Self { repo, bcrypt_cost }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        let password_hash = hash_password(password.to_string(), self.bcrypt_cost).await?;

        let user = self
            .repo
            .create(NewUser {
                email: email.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                AppError::DatabaseError(DatabaseError::Duplicate) => AppError::DuplicateEmail,
                other => other,
            })?;

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Unknown email and wrong password fail the same way.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            warn!("Wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(user)
    }

    pub async fn edit(&self, user_id: i64, update: ProfileUpdate) -> Result<()> {
        self.repo.update_profile(user_id, update).await
    }

    pub async fn profile(&self, user_id: i64) -> Result<User> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }
}

// bcrypt runs on the blocking pool
async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(AppError::from)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(AppError::from)
}
