use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::CachePolicy;

/// Upper bound for either cache TTL: 30 days.
const MAX_CACHE_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub jobs_api_url: String,
    pub jobs_api_token: Option<String>,
    /// Absent ⇒ process-local in-memory cache.
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub match_cache_ttl_secs: i64,
    pub preference_cache_ttl_secs: i64,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            jobs_api_url: non_empty("JOBS_API_URL").with_context(|| {
                "Required environment variable 'JOBS_API_URL' is not set".to_string()
            })?,
            jobs_api_token: non_empty("JOBS_API_TOKEN"),
            redis_url: non_empty("REDIS_URL"),
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            match_cache_ttl_secs: parse_ttl(&lookup, "MATCH_CACHE_TTL_SECS", 30 * 60)?,
            preference_cache_ttl_secs: parse_ttl(
                &lookup,
                "PREFERENCE_CACHE_TTL_SECS",
                24 * 60 * 60,
            )?,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            matches_ttl: chrono::Duration::seconds(self.match_cache_ttl_secs),
            preference_matches_ttl: chrono::Duration::seconds(self.preference_cache_ttl_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

/// A TTL in seconds, within `1..=MAX_CACHE_TTL_SECS`.
fn parse_ttl(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: i64) -> Result<i64> {
    let secs = parse_or(lookup, key, default)?;
    if !(1..=MAX_CACHE_TTL_SECS).contains(&secs) {
        anyhow::bail!("{key} must be between 1 and {MAX_CACHE_TTL_SECS} seconds, got {secs}");
    }
    Ok(secs)
}
