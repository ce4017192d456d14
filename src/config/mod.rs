//! Configuration module for the Innov'Events backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy event search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// VAT rate applied to new quotes that do not specify one
    pub default_vat_rate: Decimal,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("INNOV_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("INNOV_DB_PATH")
            .unwrap_or_else(|_| "./data/innovevents.sqlite".to_string())
            .into();

        let index_path = env::var("INNOV_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr_raw =
            env::var("INNOV_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|_| {
            AppError::Internal(format!("Invalid INNOV_BIND_ADDR: {}", bind_addr_raw))
        })?;

        let log_level = env::var("INNOV_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("INNOV_LOG_JSON")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let vat_raw = env::var("INNOV_DEFAULT_VAT_RATE").unwrap_or_else(|_| "20".to_string());
        let default_vat_rate = Decimal::from_str(vat_raw.trim()).map_err(|_| {
            AppError::Internal(format!("Invalid INNOV_DEFAULT_VAT_RATE: {}", vat_raw))
        })?;
        crate::workflow::validate_vat_rate(default_vat_rate)
            .map_err(|e| AppError::Internal(format!("INNOV_DEFAULT_VAT_RATE: {}", e)))?;

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_json,
            default_vat_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    // Tests below mutate the process environment.
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 7] = [
        "INNOV_API_PSK",
        "INNOV_DB_PATH",
        "INNOV_INDEX_PATH",
        "INNOV_BIND_ADDR",
        "INNOV_LOG_LEVEL",
        "INNOV_LOG_JSON",
        "INNOV_DEFAULT_VAT_RATE",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/innovevents.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.default_vat_rate, Decimal::from(20));
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("INNOV_DEFAULT_VAT_RATE", "5.5");
        env::set_var("INNOV_LOG_JSON", "true");
        env::set_var("INNOV_BIND_ADDR", "0.0.0.0:9000");

        let config = Config::from_env().unwrap();
        assert_eq!(config.default_vat_rate, Decimal::new(55, 1));
        assert!(config.log_json);
        assert_eq!(config.bind_addr.port(), 9000);

        clear_env();
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("INNOV_DEFAULT_VAT_RATE", "150");
        assert!(Config::from_env().is_err());

        env::set_var("INNOV_DEFAULT_VAT_RATE", "20");
        env::set_var("INNOV_BIND_ADDR", "not-an-address");
        assert!(Config::from_env().is_err());

        clear_env();
    }
}
