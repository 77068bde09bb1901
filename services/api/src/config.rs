//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub db_max_connections: u32,
    /// Lifetime of a login session, also used as the cookie `Max-Age`.
    pub session_ttl_days: i64,
    /// How many books the homepage sample asks for.
    pub sample_size: i64,
    pub cors_origin: HeaderValue,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let db_max_connections = positive(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;

        // --- Load Application Settings ---
        let session_ttl_days = positive(&lookup, "SESSION_TTL_DAYS", 30i64)?;
        let sample_size = positive(&lookup, "SAMPLE_SIZE", 12i64)?;

        let cors_origin_str =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_origin = HeaderValue::from_str(&cors_origin_str)
            .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            db_max_connections,
            session_ttl_days,
            sample_size,
            cors_origin,
        })
    }
}

/// Parses `key` when present, otherwise falls back to `default`.
fn parse_or<F, T>(lookup: &F, key: &str, default: Result<T, T::Err>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: std::fmt::Display,
{
    let value = parse_or(lookup, key, Ok(default))?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/books")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.sample_size, 12);
        assert_eq!(config.cors_origin, "http://localhost:3000");
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/books"),
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("RUST_LOG", "debug"),
            ("DB_MAX_CONNECTIONS", "20"),
            ("SESSION_TTL_DAYS", "7"),
            ("SAMPLE_SIZE", "4"),
            ("CORS_ORIGIN", "https://books.example.com"),
        ])
        .unwrap();

        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.sample_size, 4);
        assert_eq!(config.cors_origin, "https://books.example.com");
    }

    #[rstest]
    #[case("BIND_ADDRESS", "not-an-address")]
    #[case("RUST_LOG", "loud")]
    #[case("DB_MAX_CONNECTIONS", "0")]
    #[case("DB_MAX_CONNECTIONS", "-1")]
    #[case("SESSION_TTL_DAYS", "never")]
    #[case("SAMPLE_SIZE", "0")]
    #[case("CORS_ORIGIN", "bad\norigin")]
    fn invalid_values_are_reported_by_name(#[case] key: &str, #[case] value: &str) {
        let err = load(&[("DATABASE_URL", "postgres://db/books"), (key, value)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == key));
    }
}
