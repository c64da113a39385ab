//! Login middleware guarding every route that is not explicitly ignored.
//!
//! The middleware itself only knows about paths and responses. Deciding
//! whether a request is logged in is delegated to an [`Authenticator`]:
//! [`JwtAuthenticator`] for `Authorization` header tokens and
//! [`SessionAuthenticator`] for session cookies.

use actix_web::{
    body::{EitherBody, MessageBody},
    cookie::Cookie,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderName, HeaderValue},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use async_trait::async_trait;
use futures::future::{ready, LocalBoxFuture, Ready};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::jwt::{JwtManager, TOKEN_HEADER};
use crate::auth::session::SessionManager;
use crate::error::{AppError, AuthError};
use crate::Result as AppResult;

/// The caller identity placed in request extensions after a successful login check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or(AppError::AuthError(AuthError::MissingCredentials)),
        )
    }
}

/// Everything an authenticator may look at, pulled out of the request up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub authorization: Option<String>,
    pub user_agent: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn from_request(req: &HttpRequest, session_cookie: Option<&str>) -> Self {
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let session_token = session_cookie
            .and_then(|name| req.cookie(name))
            .map(|c| c.value().to_string());

        Self {
            authorization,
            user_agent,
            session_token,
        }
    }
}

/// Something to attach to the response so the client keeps its login alive.
#[derive(Debug, Clone)]
pub enum Renewal {
    Header(String),
    Cookie(Cookie<'static>),
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: AuthenticatedUser,
    pub renewal: Option<Renewal>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Name of the cookie this authenticator reads, if any.
    fn session_cookie(&self) -> Option<&str> {
        None
    }

    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Authenticated>;
}

pub struct JwtAuthenticator {
    jwt: Arc<JwtManager>,
}

impl JwtAuthenticator {
    pub fn new(jwt: Arc<JwtManager>) -> Self {
        Self { jwt }
    }
}

/// Splits `"<scheme> <token>"`; anything but exactly two parts is rejected.
fn token_from_header(header: &str) -> Option<&str> {
    let segments: Vec<&str> = header.split(' ').collect();
    match segments.as_slice() {
        [_, token] if !token.is_empty() => Some(*token),
        _ => None,
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Authenticated> {
        let header = credentials
            .authorization
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or(AuthError::MissingCredentials)?;
        let token = token_from_header(header).ok_or(AuthError::InvalidToken)?;

        let claims = self.jwt.verify(token)?;
        if claims.user_agent != credentials.user_agent {
            warn!("Token for user {} presented by a different user agent", claims.uid);
            return Err(AuthError::UserAgentMismatch.into());
        }

        let renewal = match self.jwt.renew_if_needed(&claims) {
            Ok(token) => token.map(Renewal::Header),
            Err(e) => {
                error!("JWT renewal failed for user {}: {}", claims.uid, e);
                None
            }
        };

        Ok(Authenticated {
            user: AuthenticatedUser { user_id: claims.uid },
            renewal,
        })
    }
}

pub struct SessionAuthenticator {
    sessions: Arc<SessionManager>,
}

impl SessionAuthenticator {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    fn session_cookie(&self) -> Option<&str> {
        Some(self.sessions.cookie_name())
    }

    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Authenticated> {
        let token = credentials
            .session_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        let check = self.sessions.validate(token).await?;
        let renewal = check
            .refreshed
            .then(|| Renewal::Cookie(self.sessions.cookie(token)));

        Ok(Authenticated {
            user: AuthenticatedUser {
                user_id: check.user_id,
            },
            renewal,
        })
    }
}

pub struct LoginMiddlewareBuilder {
    authenticator: Arc<dyn Authenticator>,
    ignored: HashSet<String>,
}

impl LoginMiddlewareBuilder {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            ignored: HashSet::new(),
        }
    }

    /// Requests whose path equals `path` exactly skip the login check.
    pub fn ignore_path(mut self, path: impl Into<String>) -> Self {
        self.ignored.insert(path.into());
        self
    }

    pub fn build(self) -> LoginMiddleware {
        LoginMiddleware {
            authenticator: self.authenticator,
            ignored: Arc::new(self.ignored),
        }
    }
}

#[derive(Clone)]
pub struct LoginMiddleware {
    authenticator: Arc<dyn Authenticator>,
    ignored: Arc<HashSet<String>>,
}

impl<S, B> Transform<S, ServiceRequest> for LoginMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoginMiddlewareService<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoginMiddlewareService {
            service: Rc::new(service),
            authenticator: Arc::clone(&self.authenticator),
            ignored: Arc::clone(&self.ignored),
        }))
    }
}

pub struct LoginMiddlewareService<S> {
    service: Rc<S>,
    authenticator: Arc<dyn Authenticator>,
    ignored: Arc<HashSet<String>>,
}

impl<S, B> Service<ServiceRequest> for LoginMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        if self.ignored.contains(req.path()) {
            return Box::pin(async move {
                service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body)
            });
        }

        let authenticator = Arc::clone(&self.authenticator);
        let credentials = Credentials::from_request(req.request(), authenticator.session_cookie());

        Box::pin(async move {
            let authenticated = match authenticator.authenticate(&credentials).await {
                Ok(authenticated) => authenticated,
                Err(err) => {
                    warn!("Rejected {} {}: {}", req.method(), req.path(), err);
                    let response = err.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            debug!("Request by user {}", authenticated.user.user_id);
            req.extensions_mut().insert(authenticated.user.clone());

            let mut res = service.call(req).await?;
            if let Some(renewal) = authenticated.renewal {
                apply_renewal(&mut res, renewal);
            }
            Ok(res.map_into_left_body())
        })
    }
}

fn apply_renewal<B>(res: &mut ServiceResponse<B>, renewal: Renewal) {
    match renewal {
        Renewal::Header(token) => match HeaderValue::from_str(&token) {
            Ok(value) => {
                res.headers_mut()
                    .insert(HeaderName::from_static(TOKEN_HEADER), value);
            }
            Err(e) => error!("Renewed token is not a valid header value: {}", e),
        },
        Renewal::Cookie(cookie) => {
            if let Err(e) = res.response_mut().add_cookie(&cookie) {
                error!("Failed to set renewed session cookie: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::UserClaims;
    use crate::auth::session::hash_token;
    use crate::db::{MemoryStore, SessionStore};
    use crate::Settings;
    use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse};
    use chrono::Utc;
    use serde_json::json;

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().json(json!({ "uid": user.user_id }))
    }

    async fn open() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    fn jwt_manager() -> Arc<JwtManager> {
        let settings = Settings::new_for_test().expect("test settings");
        Arc::new(JwtManager::new(&settings.auth))
    }

    fn jwt_middleware(jwt: Arc<JwtManager>) -> LoginMiddleware {
        LoginMiddlewareBuilder::new(Arc::new(JwtAuthenticator::new(jwt)))
            .ignore_path("/open")
            .build()
    }

    #[test]
    fn test_token_from_header() {
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("Token abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer"), None);
        assert_eq!(token_from_header("Bearer "), None);
        assert_eq!(token_from_header("Bearer a b"), None);
    }

    #[actix_web::test]
    async fn test_ignored_path_skips_login_check() {
        let app = actix_test::init_service(
            App::new()
                .wrap(jwt_middleware(jwt_manager()))
                .route("/open", web::get().to(open))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/open").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_malformed_authorization_rejected() {
        let jwt = jwt_manager();
        let token = jwt.issue(1, "agent").unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(jwt_middleware(jwt))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        for value in [token.clone(), format!("Bearer {} extra", token), "Bearer ".to_string()] {
            let req = actix_test::TestRequest::get()
                .uri("/me")
                .insert_header((header::AUTHORIZATION, value))
                .insert_header((header::USER_AGENT, "agent"))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[actix_web::test]
    async fn test_valid_token_reaches_handler() {
        let jwt = jwt_manager();
        let token = jwt.issue(42, "agent").unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(jwt_middleware(jwt))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .insert_header((header::USER_AGENT, "agent"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(TOKEN_HEADER).is_none());

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["uid"], 42);
    }

    #[actix_web::test]
    async fn test_user_agent_mismatch_rejected() {
        let jwt = jwt_manager();
        let token = jwt.issue(42, "agent").unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(jwt_middleware(jwt))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .insert_header((header::USER_AGENT, "another-agent"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_token_near_expiry_renewed_in_header() {
        let jwt = jwt_manager();
        let now = Utc::now().timestamp();
        let token = jwt
            .sign(&UserClaims {
                uid: 7,
                user_agent: "agent".into(),
                exp: now + 20,
                iat: now - 1780,
            })
            .unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(jwt_middleware(jwt.clone()))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .insert_header((header::USER_AGENT, "agent"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let renewed = resp
            .headers()
            .get(TOKEN_HEADER)
            .expect("renewed token header")
            .to_str()
            .unwrap();
        let claims = jwt.verify(renewed).unwrap();
        assert_eq!(claims.uid, 7);
        assert!(claims.exp > now + 20);
    }

    #[actix_web::test]
    async fn test_session_cookie_flow() {
        let settings = Settings::new_for_test().unwrap();
        let store = MemoryStore::new();
        let sessions = Arc::new(SessionManager::new(Arc::new(store.clone()), &settings.auth));
        let token = sessions.create(11).await.unwrap();

        let app = actix_test::init_service(
            App::new()
                .wrap(LoginMiddlewareBuilder::new(Arc::new(SessionAuthenticator::new(sessions.clone()))).build())
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .cookie(Cookie::new("ssid", token.clone()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.response().cookies().all(|c| c.name() != "ssid"));

        // make the session look idle so the next request refreshes it
        let stored = hash_token(&token);
        let idle_since = Utc::now() - chrono::Duration::seconds(45);
        store
            .touch(&stored, idle_since, idle_since + chrono::Duration::seconds(60))
            .await
            .unwrap();

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .cookie(Cookie::new("ssid", token.clone()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let refreshed = resp
            .response()
            .cookies()
            .find(|c| c.name() == "ssid")
            .expect("refreshed session cookie");
        assert_eq!(refreshed.value(), token);

        let session = store.find_by_token_hash(&stored).await.unwrap().unwrap();
        assert!(session.expires_at > Utc::now() + chrono::Duration::seconds(50));
    }
}
