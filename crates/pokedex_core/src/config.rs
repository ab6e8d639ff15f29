//! Runtime configuration for the pokedex service.
//!
//! # Invariants
//! - Configuration is read once at startup and never mutated afterwards.
//! - `default_limit` is always a positive page size.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Environment key holding the default page size.
pub const DEFAULT_LIMIT_ENV: &str = "DEFAULT_LIMIT";
/// Environment key holding the database file path.
pub const DB_PATH_ENV: &str = "POKEDEX_DB_PATH";

pub const FALLBACK_DEFAULT_LIMIT: u32 = 7;
pub const FALLBACK_DB_PATH: &str = "pokedex.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Immutable settings captured when the service is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Page size used by list queries that carry no explicit limit.
    pub default_limit: u32,
    pub db_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: FALLBACK_DEFAULT_LIMIT,
            db_path: PathBuf::from(FALLBACK_DB_PATH),
        }
    }
}

impl ServiceConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Missing or blank keys fall back to defaults; present keys must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let default_limit = match fetch(DEFAULT_LIMIT_ENV) {
            Some(raw) => parse_page_size(DEFAULT_LIMIT_ENV, &raw)?,
            None => FALLBACK_DEFAULT_LIMIT,
        };
        let db_path = fetch(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DB_PATH));

        Ok(Self {
            default_limit,
            db_path,
        })
    }

    pub fn with_default_limit(mut self, default_limit: u32) -> Self {
        self.default_limit = default_limit;
        self
    }
}

fn parse_page_size(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason,
    };

    match raw.parse::<u32>() {
        Ok(0) => Err(invalid("page size must be positive")),
        Ok(value) => Ok(value),
        Err(_) => Err(invalid("expected a positive integer")),
    }
}
