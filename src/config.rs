use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7879";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load environment variables

        let database_url = env::var("DATABASE_URL")
            .map_err(|e| ConfigError::EnvError("DATABASE_URL".to_string(), e))?;

        Ok(Config {
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            min_connections: parse_or("DB_MIN_CONNECTIONS", 5)?,
            idle_timeout: Duration::from_secs(parse_or("DB_IDLE_TIMEOUT_SECS", 30)?),
        })
    }

    /// Settings for a given database URL with every other knob at its default.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Config {
            database_url: database_url.into(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_connections: 10,
            min_connections: 5,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
