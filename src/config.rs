use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::Duration;
use log::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: String,
    pub pool_size: u32,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "chirp.db".into()),
            pool_size: env_parse("POOL_SIZE", 16),
            session_ttl: Duration::days(env_parse("SESSION_TTL_DAYS", 7)),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring unparsable {key}={raw}, using {default}");
            default
        }),
        Err(_) => default,
    }
}
