pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod users;

use std::sync::Arc;
use std::time::Duration;
use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::{AuthMode, Settings};

pub use auth::{
    Authenticator, JwtAuthenticator, JwtManager, LoginMiddleware, LoginMiddlewareBuilder,
    SessionAuthenticator, SessionManager,
};
pub use db::{DbOperations, MemoryStore, SessionStore, User, UserRepository};
pub use users::UserService;

/// Paths reachable without logging in.
pub const PUBLIC_PATHS: [&str; 4] = ["/health", "/users/signup", "/users/login", "/users/v1/login"];

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub users: Arc<UserService>,
    pub sessions: Arc<SessionManager>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// Connects to Postgres and applies migrations.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        db.migrate().await?;

        let db = Arc::new(db);
        Ok(Self::with_stores(config, db.clone(), db))
    }

    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(users, config.auth.bcrypt_cost)),
            sessions: Arc::new(SessionManager::new(sessions, &config.auth)),
            jwt: Arc::new(JwtManager::new(&config.auth)),
            config: Arc::new(config),
        }
    }

    /// Both stores backed by one shared [`MemoryStore`].
    pub fn in_memory(config: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(config, store.clone(), store)
    }

    /// The login middleware for the configured [`AuthMode`], with the public paths ignored.
    pub fn login_middleware(&self) -> LoginMiddleware {
        let authenticator: Arc<dyn Authenticator> = match self.config.auth.mode {
            AuthMode::Jwt => Arc::new(JwtAuthenticator::new(self.jwt.clone())),
            AuthMode::Session => Arc::new(SessionAuthenticator::new(self.sessions.clone())),
        };

        PUBLIC_PATHS
            .iter()
            .fold(LoginMiddlewareBuilder::new(authenticator), |builder, path| {
                builder.ignore_path(*path)
            })
            .build()
    }
}
