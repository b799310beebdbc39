//! Typed query functions over the relational store. Every function takes an
//! open connection, runs explicit parameterized SQL, and returns a typed
//! result set.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Post, Session, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";

// Post reads always join the author so streams can show who wrote what.
const POST_SELECT: &str = "SELECT p.id, p.user_id, u.username, p.content, p.created_at
     FROM posts p JOIN users u ON u.id = p.user_id";

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Current time truncated to the stored millisecond precision, so values
/// round-trip unchanged.
fn now() -> DateTime<Utc> {
    millis_to_datetime(Utc::now().timestamp_millis())
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: millis_to_datetime(row.get(5)?),
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author: row.get(2)?,
        content: row.get(3)?,
        created_at: millis_to_datetime(row.get(4)?),
    })
}

// --- users ---

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    is_admin: bool,
) -> AppResult<User> {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        is_admin,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.username,
            user.email,
            user.password_hash,
            user.is_admin,
            user.created_at.timestamp_millis(),
        ],
    )
    .map_err(map_user_conflict)?;
    Ok(user)
}

pub fn user_by_id(conn: &Connection, id: Uuid) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("user"))
}

pub fn user_by_email(conn: &Connection, email: &str) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("user"))
}

pub fn user_by_username(conn: &Connection, username: &str) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("user"))
}

fn map_user_conflict(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return AppError::Validation("username already taken".into());
            }
            if msg.contains("users.email") {
                return AppError::Validation("email already taken".into());
            }
        }
    }
    AppError::Database(err)
}

// --- posts ---

pub fn create_post(conn: &Connection, author: &User, content: &str) -> AppResult<Post> {
    let post = Post {
        id: Uuid::new_v4(),
        user_id: author.id,
        author: author.username.clone(),
        content: content.to_string(),
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO posts (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            post.id,
            post.user_id,
            post.content,
            post.created_at.timestamp_millis(),
        ],
    )?;
    Ok(post)
}

pub fn post_by_id(conn: &Connection, id: Uuid) -> AppResult<Post> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("post"))
}

// --- streams ---
//
// Most-recent-first, with insertion order breaking millisecond ties.

pub fn global_stream(conn: &Connection, limit: u32) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{POST_SELECT} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?1"
    ))?;
    let posts = stmt
        .query_map(params![limit], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    debug!("global stream returned {} posts", posts.len());
    Ok(posts)
}

/// Posts by everyone the viewer follows, plus the viewer's own.
pub fn network_stream(conn: &Connection, viewer_id: Uuid, limit: u32) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{POST_SELECT}
         WHERE p.user_id = ?1
            OR p.user_id IN (SELECT followee_id FROM relationships WHERE follower_id = ?1)
         ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?2"
    ))?;
    let posts = stmt
        .query_map(params![viewer_id, limit], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

pub fn user_stream(conn: &Connection, user_id: Uuid, limit: u32) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{POST_SELECT} WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?2"
    ))?;
    let posts = stmt
        .query_map(params![user_id, limit], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

// --- relationships ---

/// Idempotent: duplicate edges collapse onto the (follower, followee)
/// primary key. Returns whether a new edge was created.
pub fn follow(conn: &Connection, follower_id: Uuid, followee_id: Uuid) -> AppResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO relationships (follower_id, followee_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![follower_id, followee_id, Utc::now().timestamp_millis()],
    )?;
    Ok(changed == 1)
}

/// Returns whether an edge was removed; unfollowing a stranger is a no-op.
pub fn unfollow(conn: &Connection, follower_id: Uuid, followee_id: Uuid) -> AppResult<bool> {
    let changed = conn.execute(
        "DELETE FROM relationships WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, followee_id],
    )?;
    Ok(changed == 1)
}

// --- sessions ---

pub fn create_session(conn: &Connection, user_id: Uuid, ttl: Duration) -> AppResult<Session> {
    let created_at = now();
    let session = Session {
        token: Uuid::new_v4(),
        user_id,
        created_at,
        expires_at: created_at + ttl,
    };
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            session.token,
            session.user_id,
            session.created_at.timestamp_millis(),
            session.expires_at.timestamp_millis(),
        ],
    )?;
    Ok(session)
}

/// Resolve a session token to its user, refusing expired sessions.
pub fn session_user(conn: &Connection, token: Uuid, at: DateTime<Utc>) -> AppResult<User> {
    conn.query_row(
        "SELECT u.id, u.username, u.email, u.password_hash, u.is_admin, u.created_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > ?2",
        params![token, at.timestamp_millis()],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::LoginRequired)
}

pub fn delete_session(conn: &Connection, token: Uuid) -> AppResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn purge_expired_sessions(conn: &Connection, at: DateTime<Utc>) -> AppResult<usize> {
    let purged = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![at.timestamp_millis()],
    )?;
    if purged > 0 {
        debug!("purged {purged} expired sessions");
    }
    Ok(purged)
}
