use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::sync::cache::DEFAULT_SNAPSHOT_KEY;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,

    // None selects the in-process cache
    pub cache_url: Option<String>,
    pub snapshot_key: String,

    pub watch_interval: Duration,
    pub subscriber_buffer: usize,

    // Rate limiting
    pub rate_query_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,

            cache_url: env::var("CACHE_URL")
                .or_else(|_| env::var("REDIS_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty()),
            snapshot_key: env::var("SNAPSHOT_KEY")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_KEY.to_string()),

            watch_interval: Duration::from_millis(parse_var("WATCH_INTERVAL_MS", 100)?),
            subscriber_buffer: parse_var("SUBSCRIBER_BUFFER", 16)?,

            rate_query_per_min: parse_var("RATE_QUERY_PER_MIN", 120)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{name} has an invalid value: {raw:?}"))
}
