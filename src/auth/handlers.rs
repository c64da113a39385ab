use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::jwt::TOKEN_HEADER;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

fn user_agent(req: &HttpRequest) -> &str {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
}

/// Token login: the token is bound to the caller's `User-Agent`.
pub async fn login(
    http: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received token login request for email: {}", req.email);
    let user = match state.users.sign_in(&req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            return Err(e);
        }
    };

    let token = state.jwt.issue(user.id, user_agent(&http))?;
    info!("Login successful for user {}", user.id);

    Ok(HttpResponse::Ok()
        .insert_header((TOKEN_HEADER, token.clone()))
        .json(AuthResponse { token }))
}

/// Cookie login backed by a server-side session.
pub async fn login_session(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received session login request for email: {}", req.email);
    let user = match state.users.sign_in(&req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            return Err(e);
        }
    };

    let token = state.sessions.create(user.id).await?;
    info!("Session login successful for user {}", user.id);

    Ok(HttpResponse::Ok()
        .cookie(state.sessions.cookie(&token))
        .json(serde_json::json!({
            "message": "Login successful"
        })))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Some(cookie) = req.cookie(state.sessions.cookie_name()) {
        state.sessions.destroy(cookie.value()).await?;
    }

    Ok(HttpResponse::Ok()
        .cookie(state.sessions.removal_cookie())
        .json(serde_json::json!({
            "message": "Successfully logged out"
        })))
}
