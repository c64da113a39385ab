//! Authentication module for the webook server
//!
//! Token and session login, and the middleware that enforces them.

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod session;

pub use jwt::{JwtManager, UserClaims, TOKEN_HEADER};
pub use middleware::{
    AuthenticatedUser, Authenticator, JwtAuthenticator, LoginMiddleware, LoginMiddlewareBuilder,
    SessionAuthenticator,
};
pub use session::{SessionCheck, SessionManager};
