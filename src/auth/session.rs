use actix_web::cookie::{time, Cookie};
use base64::{engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD}, Engine};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::config::AuthConfig;
use crate::db::{Session, SessionStore};
use crate::error::AuthError;
use crate::Result;

const TOKEN_BYTES: usize = 32;

/// Outcome of a successful session lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCheck {
    pub user_id: i64,
    /// The session's lifetime was extended and the cookie must be sent again.
    pub refreshed: bool,
}

/// Server-side login sessions keyed by an opaque cookie token.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    max_age: Duration,
    refresh_after: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            cookie_name: config.session_cookie.clone(),
            max_age: Duration::seconds(config.session_max_age_secs),
            refresh_after: Duration::seconds(config.session_refresh_secs),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Starts a session and returns the token to hand to the client.
    pub async fn create(&self, user_id: i64) -> Result<String> {
        let token = generate_token();
        let session = Session::new(user_id, hash_token(&token), self.max_age);
        self.store.insert(&session).await?;
        debug!("Created session {} for user {}", session.id, user_id);
        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> Result<SessionCheck> {
        let token_hash = hash_token(token);
        let session = self
            .store
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(AuthError::SessionExpired.into());
        }

        if now - session.last_activity > self.refresh_after {
            self.store.touch(&token_hash, now, now + self.max_age).await?;
            return Ok(SessionCheck {
                user_id: session.user_id,
                refreshed: true,
            });
        }

        Ok(SessionCheck {
            user_id: session.user_id,
            refreshed: false,
        })
    }

    pub async fn destroy(&self, token: &str) -> Result<()> {
        self.store.delete(&hash_token(token)).await
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.delete_expired(Utc::now()).await
    }

    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), token.to_string())
            .path("/")
            .http_only(true)
            .max_age(time::Duration::seconds(self.max_age.num_seconds()))
            .finish()
    }

    /// A cookie that makes the client drop its session token.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), String::new())
            .path("/")
            .http_only(true)
            .max_age(time::Duration::ZERO)
            .finish()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
    BASE64.encode(Sha256::digest(token.as_bytes()))
}
