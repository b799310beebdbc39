use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use log::debug;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Session, User};
use crate::repo;

pub const SESSION_COOKIE: &str = "session";

/// The viewer behind a request, resolved from the session cookie. Routes
/// that take this extractor reject unauthenticated requests with 401 before
/// the handler body runs.
pub struct AuthenticatedUser {
    pub user: User,
    pub token: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let pool = req.app_data::<web::Data<DbPool>>().cloned();
        let token = req
            .cookie(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

        Box::pin(async move {
            let pool = pool.ok_or(AppError::Internal("database pool missing from app data"))?;
            let token = token.ok_or(AppError::LoginRequired)?;
            let user = web::block(move || {
                let conn = pool.get()?;
                repo::session_user(&conn, token, Utc::now())
            })
            .await??;
            Ok(AuthenticatedUser { user, token })
        })
    }
}

/// Verify credentials against the stored hash and establish a session.
/// Unknown email and wrong password surface the same error.
pub async fn login(
    pool: web::Data<DbPool>,
    email: String,
    password: String,
    ttl: Duration,
) -> AppResult<(User, Session)> {
    web::block(move || {
        let conn = pool.get()?;
        let user = match repo::user_by_email(&conn, &email) {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(AppError::CredentialMismatch),
            Err(err) => return Err(err),
        };
        if !bcrypt::verify(&password, &user.password_hash)? {
            return Err(AppError::CredentialMismatch);
        }
        repo::purge_expired_sessions(&conn, Utc::now())?;
        let session = repo::create_session(&conn, user.id, ttl)?;
        debug!("session established for {}", user.username);
        Ok((user, session))
    })
    .await?
}

pub async fn logout(pool: web::Data<DbPool>, token: Uuid) -> AppResult<()> {
    web::block(move || {
        let conn = pool.get()?;
        repo::delete_session(&conn, token)
    })
    .await?
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}
