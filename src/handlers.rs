use actix_web::{get, post, web, HttpResponse};
use bcrypt::{hash, DEFAULT_COST};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{self, AuthenticatedUser};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{CreatePostRequest, LoginRequest, RegisterRequest};
use crate::repo;

/// Streams never return more than this many posts.
pub const STREAM_LIMIT: u32 = 99;

#[get("/register")]
pub async fn register_form() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "fields": ["username", "email", "password"] }))
}

#[post("/register")]
pub async fn register(
    pool: web::Data<DbPool>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let RegisterRequest {
        username,
        email,
        password,
    } = body.into_inner();
    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "username, email and password are required".into(),
        ));
    }

    let user = web::block(move || {
        let password_hash = hash(password.as_bytes(), DEFAULT_COST)?;
        let conn = pool.get()?;
        repo::create_user(&conn, &username, &email, &password_hash, false)
    })
    .await??;

    info!("registered user {} ({})", user.username, user.id);
    Ok(HttpResponse::Created().json(user))
}

#[get("/login")]
pub async fn login_form() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "fields": ["email", "password"] }))
}

#[post("/login")]
pub async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let LoginRequest { email, password } = body.into_inner();
    let (user, session) = auth::login(
        pool,
        email.trim().to_lowercase(),
        password,
        config.session_ttl,
    )
    .await?;

    info!("user {} logged in", user.username);
    Ok(HttpResponse::Ok()
        .cookie(auth::session_cookie(session.token))
        .json(json!({ "message": "access granted", "user": user })))
}

#[get("/logout")]
pub async fn logout(
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    auth::logout(pool, viewer.token).await?;
    info!("user {} logged out", viewer.user.username);
    Ok(HttpResponse::Ok()
        .cookie(auth::removal_cookie())
        .json(json!({ "message": "see you later" })))
}

#[get("/new")]
pub async fn new_post_form(_viewer: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "fields": ["content"] }))
}

#[post("/new")]
pub async fn create_post(
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let content = body.into_inner().content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("content must not be empty".into()));
    }

    let author = viewer.user;
    let post = web::block(move || {
        let conn = pool.get()?;
        repo::create_post(&conn, &author, &content)
    })
    .await??;

    info!("post {} created by {}", post.id, post.author);
    Ok(HttpResponse::Created().json(post))
}

#[get("/")]
pub async fn index(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let posts = web::block(move || {
        let conn = pool.get()?;
        repo::global_stream(&conn, STREAM_LIMIT)
    })
    .await??;
    Ok(HttpResponse::Ok().json(posts))
}

#[get("/stream")]
pub async fn network_stream(
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let viewer_id = viewer.user.id;
    let posts = web::block(move || {
        let conn = pool.get()?;
        repo::network_stream(&conn, viewer_id, STREAM_LIMIT)
    })
    .await??;
    Ok(HttpResponse::Ok().json(posts))
}

#[get("/stream/{username}")]
pub async fn user_stream(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let username = path.into_inner();
    let posts = web::block(move || {
        let conn = pool.get()?;
        let user = repo::user_by_username(&conn, &username)?;
        repo::user_stream(&conn, user.id, STREAM_LIMIT)
    })
    .await??;
    Ok(HttpResponse::Ok().json(posts))
}

#[get("/post/{id}")]
pub async fn view_post(pool: web::Data<DbPool>, path: web::Path<String>) -> AppResult<HttpResponse> {
    // Malformed ids 404 the same way unknown ones do.
    let id = Uuid::parse_str(&path.into_inner()).map_err(|_| AppError::NotFound("post"))?;
    let post = web::block(move || {
        let conn = pool.get()?;
        repo::post_by_id(&conn, id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(post))
}

#[get("/follow/{username}")]
pub async fn follow(
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let username = path.into_inner();
    let follower = viewer.user;
    let (target, created) = web::block(move || {
        let conn = pool.get()?;
        let target = repo::user_by_username(&conn, &username)?;
        if target.id == follower.id {
            return Err(AppError::Validation("you cannot follow yourself".into()));
        }
        let created = repo::follow(&conn, follower.id, target.id)?;
        Ok((target, created))
    })
    .await??;

    let message = if created {
        info!("new follow edge to {}", target.username);
        format!("you are now following {}", target.username)
    } else {
        format!("you already follow {}", target.username)
    };
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

#[get("/unfollow/{username}")]
pub async fn unfollow(
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let username = path.into_inner();
    let follower = viewer.user;
    let (target, removed) = web::block(move || {
        let conn = pool.get()?;
        let target = repo::user_by_username(&conn, &username)?;
        let removed = repo::unfollow(&conn, follower.id, target.id)?;
        Ok::<_, AppError>((target, removed))
    })
    .await??;

    let message = if removed {
        info!("follow edge to {} removed", target.username);
        format!("you have unfollowed {}", target.username)
    } else {
        format!("you were not following {}", target.username)
    };
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}
