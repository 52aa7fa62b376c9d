//! # Engine Configuration
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `LUSTRE_DB_PATH` | caller-supplied | SQLite file |
//! | `LUSTRE_MAX_CONNECTIONS` | 5 | Pool size |
//! | `LUSTRE_RETRY_ATTEMPTS` | 5 | Attempts per order transaction |
//! | `LUSTRE_RETRY_BACKOFF_MS` | 20 | First retry delay (exponential, jittered) |
//! | `LUSTRE_RETRY_MAX_BACKOFF_MS` | 500 | Retry delay ceiling |
//! | `LUSTRE_ACCEPT_PRICE_OVERRIDES` | false | Honor caller tax / shipping |
//! | `LUSTRE_PRICING_TABLE` | built-in table | JSON pricing table path |

use lustre_core::RegionalPricing;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::pool::DbConfig;
use crate::service::RetryPolicy;

/// Order engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file. `None` lets the caller pick a default.
    pub database_path: Option<PathBuf>,

    /// Maximum pool connections.
    pub max_connections: u32,

    /// Retry policy for row and transaction conflicts.
    pub retry: RetryPolicy,

    /// Whether caller-supplied tax / shipping amounts replace computed ones.
    pub accept_price_overrides: bool,

    /// Path of a JSON pricing table; `None` uses the built-in table.
    pub pricing_table: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: None,
            max_connections: 5,
            retry: RetryPolicy::default(),
            accept_price_overrides: false,
            pricing_table: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `LUSTRE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let max_connections = parse_or("LUSTRE_MAX_CONNECTIONS", &lookup, defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue("LUSTRE_MAX_CONNECTIONS".to_string()));
        }

        let attempts = parse_or("LUSTRE_RETRY_ATTEMPTS", &lookup, defaults.retry.max_attempts)?;
        let backoff_ms = parse_or(
            "LUSTRE_RETRY_BACKOFF_MS",
            &lookup,
            defaults.retry.initial_backoff.as_millis() as u64,
        )?;
        let max_backoff_ms = parse_or(
            "LUSTRE_RETRY_MAX_BACKOFF_MS",
            &lookup,
            defaults.retry.max_backoff.as_millis() as u64,
        )?;

        let accept_price_overrides = match lookup("LUSTRE_ACCEPT_PRICE_OVERRIDES") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::InvalidValue("LUSTRE_ACCEPT_PRICE_OVERRIDES".to_string()))?,
            None => defaults.accept_price_overrides,
        };

        Ok(EngineConfig {
            database_path: lookup("LUSTRE_DB_PATH").map(PathBuf::from),
            max_connections,
            retry: RetryPolicy::new(attempts, Duration::from_millis(backoff_ms))
                .max_backoff(Duration::from_millis(max_backoff_ms)),
            accept_price_overrides,
            pricing_table: lookup("LUSTRE_PRICING_TABLE").map(PathBuf::from),
        })
    }

    /// The database file: `explicit` (a command-line flag) wins over
    /// `LUSTRE_DB_PATH`. `None` leaves the default to the caller.
    pub fn resolve_database_path(&self, explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| self.database_path.clone())
    }

    /// Pool configuration for `path`.
    pub fn db_config(&self, path: impl Into<PathBuf>) -> DbConfig {
        DbConfig::new(path).max_connections(self.max_connections)
    }

    /// Loads the pricing table, or the built-in one.
    pub fn load_pricing(&self) -> Result<RegionalPricing, ConfigError> {
        let Some(path) = &self.pricing_table else {
            return Ok(RegionalPricing::default());
        };

        info!(path = %path.display(), "Loading pricing table");

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::PricingTable {
            path: path.clone(),
            message: e.to_string(),
        })?;

        RegionalPricing::from_json(&raw).map_err(|e| ConfigError::PricingTable {
            path: path.clone(),
            message: e.to_string(),
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Cannot load pricing table {path}: {message}")]
    PricingTable { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.accept_price_overrides);
        assert!(config.database_path.is_none());
        assert!(config.resolve_database_path(None).is_none());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("LUSTRE_DB_PATH", "/var/lib/lustre.db"),
            ("LUSTRE_RETRY_ATTEMPTS", "8"),
            ("LUSTRE_RETRY_BACKOFF_MS", "5"),
            ("LUSTRE_RETRY_MAX_BACKOFF_MS", "80"),
            ("LUSTRE_ACCEPT_PRICE_OVERRIDES", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(5));
        assert_eq!(config.retry.max_backoff, Duration::from_millis(80));
        assert!(config.accept_price_overrides);
        assert_eq!(
            config.resolve_database_path(None),
            Some(PathBuf::from("/var/lib/lustre.db"))
        );
        assert_eq!(
            config.resolve_database_path(Some(PathBuf::from("flag.db"))),
            Some(PathBuf::from("flag.db"))
        );
        assert_eq!(config.db_config("flag.db").database_path, PathBuf::from("flag.db"));
    }

    #[test]
    fn test_malformed_values() {
        let err = EngineConfig::from_lookup(lookup(&[("LUSTRE_RETRY_ATTEMPTS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == "LUSTRE_RETRY_ATTEMPTS"));

        assert!(EngineConfig::from_lookup(lookup(&[("LUSTRE_MAX_CONNECTIONS", "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("LUSTRE_ACCEPT_PRICE_OVERRIDES", "maybe")])).is_err());
    }

    #[test]
    fn test_pricing_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(
            &path,
            r#"{ "regions": { "Canada": { "taxRateBps": 1300, "shippingCents": 1500 } },
                 "fallback": { "taxRateBps": 0, "shippingCents": 0 } }"#,
        )
        .unwrap();

        let config = EngineConfig {
            pricing_table: Some(path),
            ..EngineConfig::default()
        };
        let pricing = config.load_pricing().unwrap();
        assert_eq!(pricing.rate_for(Some("canada")).tax_rate_bps, 1300);

        let missing = EngineConfig {
            pricing_table: Some(dir.path().join("nope.json")),
            ..EngineConfig::default()
        };
        assert!(matches!(missing.load_pricing(), Err(ConfigError::PricingTable { .. })));
    }
}
