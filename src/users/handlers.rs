use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::auth::handlers::{login, login_session, logout};
use crate::auth::AuthenticatedUser;
use crate::db::{Profile, ProfileUpdate};
use crate::error::AppError;
use crate::users::validation::{validate_profile, validate_signup};
use crate::{AppState, AuthMode};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub nickname: String,
    pub birthday: String,
    #[serde(default)]
    pub introduction: String,
}

/// Mounts the `/users` scope. Only the login route of the active mode is
/// mounted: `/login` issues tokens, `/v1/login` opens a session.
pub fn configure_routes(mode: AuthMode) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        let (login_path, login_route) = match mode {
            AuthMode::Jwt => ("/login", web::post().to(login)),
            AuthMode::Session => ("/v1/login", web::post().to(login_session)),
        };

        cfg.service(
            web::scope("/users")
                .route("/signup", web::post().to(signup))
                .route(login_path, login_route)
                .route("/logout", web::post().to(logout))
                .route("/edit", web::post().to(edit))
                .route("/profile", web::get().to(profile)),
        );
    }
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    validate_signup(&req.email, &req.password, &req.confirm_password)?;

    match state.users.sign_up(&req.email, &req.password).await {
        Ok(user) => {
            info!("Signup successful for user {}", user.id);
            Ok(HttpResponse::Created().json(json!({
                "message": "Signup successful"
            })))
        }
        Err(e) => {
            error!("Signup failed for email {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn edit(
    user: AuthenticatedUser,
    req: web::Json<EditRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    validate_profile(&req.nickname, &req.birthday, &req.introduction)?;

    state
        .users
        .edit(
            user.user_id,
            ProfileUpdate {
                nickname: req.nickname,
                birthday: req.birthday,
                introduction: req.introduction,
            },
        )
        .await?;

    info!("Profile updated for user {}", user.user_id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated"
    })))
}

pub async fn profile(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let found = state.users.profile(user.user_id).await.map_err(|e| {
        error!("Profile lookup failed for user {}: {}", user.user_id, e);
        e
    })?;

    Ok(HttpResponse::Ok().json(Profile::from(found)))
}
