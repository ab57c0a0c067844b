//! Configuration loader for the `aircare-backend` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase. The shared
//! secrets for the device and station APIs live here as immutable fields
//! injected into the dispatcher and poller at construction.
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Air cleaner device speed endpoint.
    pub device_api_url: String,

    /// Shared secret sent with every device command.
    pub device_api_key: String,

    /// National air quality API base URL.
    pub station_api_url: String,

    /// Service key for the national air quality API.
    pub station_api_key: String,

    /// Monitoring station whose records the poller stores.
    pub station_name: String,

    /// Seconds between station polls.
    pub poll_interval_secs: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `DEVICE_API_URL` – air cleaner speed endpoint
/// - `DEVICE_API_KEY` – device shared secret
/// - `STATION_API_URL` – national air quality API base URL
/// - `STATION_API_KEY` – air quality API service key
/// - `STATION_NAME` – monitoring station to poll
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `POLL_INTERVAL_SECS` – station poll interval (default: 3600)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let device_api_url = require_env!("DEVICE_API_URL");
    let device_api_key = require_env!("DEVICE_API_KEY");
    let station_api_url = require_env!("STATION_API_URL");
    let station_api_key = require_env!("STATION_API_KEY");
    let station_name = require_env!("STATION_NAME");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let poll_interval_secs = parse_env_u32!("POLL_INTERVAL_SECS", 3600);

    Ok(Config {
        db_url,
        db_pool_max,
        device_api_url,
        device_api_key,
        station_api_url,
        station_api_key,
        station_name,
        poll_interval_secs,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and API keys
    /// while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL       : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX        : {}", self.db_pool_max);
        tracing::info!("  DEVICE_API_URL     : {}", self.device_api_url);
        tracing::info!("  DEVICE_API_KEY     : {}", mask_secret(&self.device_api_key));
        tracing::info!("  STATION_API_URL    : {}", self.station_api_url);
        tracing::info!("  STATION_API_KEY    : {}", mask_secret(&self.station_api_key));
        tracing::info!("  STATION_NAME       : {}", self.station_name);
        tracing::info!("  POLL_INTERVAL_SECS : {}", self.poll_interval_secs);
    }
}

fn mask_secret(secret: &str) -> String {
    // ---
    if secret.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &secret[..4])
    }
}
