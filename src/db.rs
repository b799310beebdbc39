use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            BLOB PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    id         BLOB PRIMARY KEY,
    user_id    BLOB NOT NULL REFERENCES users(id),
    content    TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_user_created ON posts(user_id, created_at);

CREATE TABLE IF NOT EXISTS relationships (
    follower_id BLOB NOT NULL REFERENCES users(id),
    followee_id BLOB NOT NULL REFERENCES users(id),
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (follower_id, followee_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    token      BLOB PRIMARY KEY,
    user_id    BLOB NOT NULL REFERENCES users(id),
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
";

pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
    r2d2::Pool::builder().max_size(max_size).build(manager)
}

/// Open a single connection outside the pool, for batch tools.
pub fn open(path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_connection(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
}

/// In-memory pool with a single connection, so every acquisition sees the
/// same database.
#[cfg(test)]
pub fn memory_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(configure_connection);
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("failed to build in-memory pool");
    init_schema(&pool.get().expect("failed to acquire connection"))
        .expect("failed to initialize schema");
    pool
}
