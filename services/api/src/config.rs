//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
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
    pub generation_api_key: Option<String>,
    /// Base URL of an OpenAI-compatible endpoint; the public API when unset.
    pub generation_api_base: Option<String>,
    pub course_model: String,
    pub youtube_api_key: Option<String>,
    pub allowed_origin: String,
    /// Fixes the random source of sampling and banner selection.
    pub rng_seed: Option<u64>,
    pub session_ttl_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Collaborator Settings (keys are optional) ---
        let generation_api_key = lookup("GENERATION_API_KEY").filter(|v| !v.is_empty());
        let generation_api_base = lookup("GENERATION_API_BASE").filter(|v| !v.is_empty());
        let course_model = lookup("COURSE_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let youtube_api_key = lookup("YOUTUBE_API_KEY").filter(|v| !v.is_empty());

        // --- Load Web Settings ---
        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let rng_seed = lookup("RNG_SEED")
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|e| ConfigError::InvalidValue("RNG_SEED".to_string(), e.to_string()))
            })
            .transpose()?;

        let session_ttl_days = match lookup("SESSION_TTL_DAYS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "SESSION_TTL_DAYS".to_string(),
                        format!("'{}' is not a positive number of days", raw),
                    ))
                }
            },
            None => 30,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            generation_api_key,
            generation_api_base,
            course_model,
            youtube_api_key,
            allowed_origin,
            rng_seed,
            session_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
        let config = load(&[("DATABASE_URL", "postgres://localhost/learnpath")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.course_model, "gpt-4o-mini");
        assert_eq!(config.allowed_origin, "http://localhost:3000");
        assert_eq!(config.session_ttl_days, 30);
        assert!(config.rng_seed.is_none());
        assert!(config.generation_api_key.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn invalid_values_name_their_variable() {
        let err = load(&[("DATABASE_URL", "x"), ("RNG_SEED", "seven")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RNG_SEED"));

        let err = load(&[("DATABASE_URL", "x"), ("SESSION_TTL_DAYS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "SESSION_TTL_DAYS"));

        let err = load(&[("DATABASE_URL", "x"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("DATABASE_URL", "x"),
            ("RNG_SEED", "42"),
            ("COURSE_MODEL", "gpt-4o"),
            ("GENERATION_API_KEY", ""),
            ("YOUTUBE_API_KEY", "yt"),
        ])
        .unwrap();
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.course_model, "gpt-4o");
        assert!(config.generation_api_key.is_none());
        assert_eq!(config.youtube_api_key.as_deref(), Some("yt"));
    }
}
